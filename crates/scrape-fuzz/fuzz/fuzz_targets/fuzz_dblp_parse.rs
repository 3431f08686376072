#![no_main]

use libfuzzer_sys::fuzz_target;
use paper_scrape::DBLP_VENUE_SCHEME;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = std::str::from_utf8(data) else {
        return;
    };

    // DBLP search, DBLP venue and CSL-JSON parsers must treat any body as "no match" or a match
    for parser in scrape_fuzz::parsers() {
        let mut record = scrape_fuzz::seed_record();
        record.set_venue_marker(DBLP_VENUE_SCHEME, "conf/nips", false);
        parser.parse(body, &mut record);
    }
});
