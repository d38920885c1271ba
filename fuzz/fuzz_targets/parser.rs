#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|source: &str| {
    // Whatever parses must print back to text that parses to the same data.
    if let Ok(expressions) = scheme::parse(source) {
        for expression in expressions {
            let printed = expression.to_string();
            let reparsed = scheme::read_line(&printed).expect("printed expressions are readable");
            assert_eq!(expression, reparsed, "{} did not survive printing", printed);
        }
    }
});
