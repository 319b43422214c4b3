//! NMEA 0183 sentence validation and normalization
//!
//! Structural checks only: leading `$`/`!` and the optional `*HH` XOR
//! checksum. Field contents are never interpreted.

/// Strip trailing CR/LF bytes (any number, any mix)
fn trim_line_ending(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b'\r' | b'\n'] = line {
        line = rest;
    }
    line
}

/// Verify the `*HH` checksum of a raw sentence.
///
/// Trailing CR/LF is ignored. A sentence without `*` has no checksum to
/// verify and passes; some devices never emit one. The rightmost `*` is
/// taken as the checksum delimiter so a stray `*` in the payload does not
/// shift the field.
pub fn checksum_ok(line: &[u8]) -> bool {
    let line = trim_line_ending(line);
    if line.is_empty() || (line[0] != b'$' && line[0] != b'!') {
        return false;
    }
    let Some(star) = line.iter().rposition(|&b| b == b'*') else {
        return true;
    };
    let Some(given) = line.get(star + 1..star + 3) else {
        return false;
    };
    if !given.iter().all(|b| b.is_ascii_hexdigit()) {
        return false;
    }
    let given = match std::str::from_utf8(given)
        .ok()
        .and_then(|s| u8::from_str_radix(s, 16).ok())
    {
        Some(v) => v,
        None => return false,
    };

    // XOR over the bytes strictly between the prefix and the '*'
    let calc = line[1..star].iter().fold(0u8, |acc, &b| acc ^ b);
    calc == given
}

/// Normalize a raw line to canonical CRLF termination.
///
/// Strips every trailing CR/LF and appends exactly one `\r\n`. Pure
/// reformatting; call [`checksum_ok`] separately when validation is wanted.
pub fn normalize(line: &[u8]) -> Vec<u8> {
    let body = trim_line_ending(line);
    let mut out = Vec::with_capacity(body.len() + 2);
    out.extend_from_slice(body);
    out.extend_from_slice(b"\r\n");
    out
}
