use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::domain::ViewerError;

/// One parsed data line, keyed by header token. Key insertion order is
/// significant: column resolution scans it to build the column union.
/// A field missing from a short line is absent here, not an empty string.
pub type Record = IndexMap<String, String>;

pub const ROW_DELIMITER: &str = "\r\n";
pub const FIELD_DELIMITER: char = ',';

/// Convert raw CSV text into an ordered record set.
///
/// Line 0 is the header. Data rows are lines 1 through the second-to-last
/// line: the final line is dropped as the trailing artifact of the closing
/// row delimiter. A file that does not end in `\r\n` therefore loses its
/// last data row. Existing tier list files rely on that slicing; do not
/// "fix" it here.
///
/// Short lines leave their trailing columns absent, long lines have the
/// extra fields discarded. No delimiter escaping is supported: a field
/// containing a literal `,` or `\r\n` corrupts alignment. That is a hard
/// input constraint, not something this parser defends against.
///
/// Only empty input fails; every row/column count mismatch is absorbed by
/// the policies above.
pub fn parse(text: &str) -> Result<Vec<Record>, ViewerError> {
    if text.is_empty() {
        return Err(ViewerError::MalformedInput(
            "empty input, no header line".to_string(),
        ));
    }

    let lines: Vec<&str> = text.split(ROW_DELIMITER).collect();
    let header: Vec<&str> = lines[0].split(FIELD_DELIMITER).collect();
    trace!("Header tokens: {:?}", header);

    let mut records = Vec::new();
    for line in &lines[1..lines.len().saturating_sub(1).max(1)] {
        let mut record = Record::new();
        for (key, field) in header.iter().zip(line.split(FIELD_DELIMITER)) {
            record.insert((*key).to_string(), field.to_string());
        }
        records.push(record);
    }

    debug!(
        "Parsed {} records over {} header columns",
        records.len(),
        header.len()
    );
    Ok(records)
}
