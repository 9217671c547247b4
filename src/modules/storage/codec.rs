//! Comma-separated record encoding used by both backing files.
//!
//! One record per line, no header. A field is wrapped in double quotes when it
//! contains a comma, a quote, CR or LF (or starts with whitespace), and inner
//! quotes are doubled. Blank lines are ignored when decoding.

const DELIMITER: char = ',';
const QUOTE: char = '"';

fn needs_quotes(field: &str) -> bool {
    field.starts_with([' ', '\t'])
        || field.contains(|c| c == DELIMITER || c == QUOTE || c == '\r' || c == '\n')
}

/// Encode one record, including the trailing newline
pub fn encode_record(fields: &[&str]) -> String {
    let mut line = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(DELIMITER);
        }
        if needs_quotes(field) {
            line.push(QUOTE);
            line.push_str(&field.replace(QUOTE, "\"\""));
            line.push(QUOTE);
        } else {
            line.push_str(field);
        }
    }
    line.push('\n');
    line
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Decode every record in `text`. The error string names the offending line.
pub fn decode_records(text: &str) -> Result<Vec<Vec<String>>, String> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut state = State::FieldStart;
    let mut line = 1usize;
    let mut quote_line = 0usize;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\r' && state != State::Quoted && chars.peek() == Some(&'\n') {
            continue;
        }
        match state {
            State::FieldStart | State::Unquoted => match c {
                QUOTE if state == State::FieldStart => {
                    state = State::Quoted;
                    quote_line = line;
                }
                DELIMITER => {
                    record.push(std::mem::take(&mut field));
                    state = State::FieldStart;
                }
                '\n' => {
                    // nothing consumed on this line means it was blank
                    if !(record.is_empty() && state == State::FieldStart) {
                        record.push(std::mem::take(&mut field));
                        records.push(std::mem::take(&mut record));
                    }
                    state = State::FieldStart;
                    line += 1;
                }
                _ => {
                    field.push(c);
                    state = State::Unquoted;
                }
            },
            State::Quoted => {
                if c == QUOTE {
                    state = State::QuoteInQuoted;
                } else {
                    if c == '\n' {
                        line += 1;
                    }
                    field.push(c);
                }
            }
            State::QuoteInQuoted => match c {
                QUOTE => {
                    field.push(QUOTE);
                    state = State::Quoted;
                }
                DELIMITER => {
                    record.push(std::mem::take(&mut field));
                    state = State::FieldStart;
                }
                '\n' => {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                    state = State::FieldStart;
                    line += 1;
                }
                other => {
                    return Err(format!(
                        "line {}: unexpected {:?} after closing quote",
                        line, other
                    ));
                }
            },
        }
    }

    match state {
        State::Quoted => {
            return Err(format!("line {}: unterminated quoted field", quote_line));
        }
        State::FieldStart if record.is_empty() => {}
        _ => {
            record.push(field);
            records.push(record);
        }
    }

    Ok(records)
}
