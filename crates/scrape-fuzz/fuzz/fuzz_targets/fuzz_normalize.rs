#![no_main]

use libfuzzer_sys::fuzz_target;
use paper_scrape::normalize::{NormalizeOptions, normalize};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let options = NormalizeOptions::title_match();
    let once = normalize(text, &options);
    assert_eq!(normalize(&once, &options), once);
});
