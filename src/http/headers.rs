use std::collections::HashMap;

/// A parsed HTTP header block: the words of the first line, the MIME
/// fields with upper-cased names, and the offset of the first body byte.
pub(crate) struct HeaderBlock {
    pub(crate) start_line: Vec<String>,
    pub(crate) fields: HashMap<String, String>,
    pub(crate) body_start: usize,
}

/// Offset just past the blank line terminating a header block, if the
/// block is complete.
pub(crate) fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

/// Parses a complete header block out of `buf`.
///
/// Header names are upper-cased (they are case-insensitive on the wire);
/// continuation lines starting with a space or tab fold into the previous
/// value.
pub(crate) fn parse_header_block(buf: &[u8]) -> Option<HeaderBlock> {
    let body_start = header_end(buf)?;
    let head = &buf[..body_start - 4];

    let mut lines = head.split(|&b| b == b'\n').map(|line| {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        String::from_utf8_lossy(line).into_owned()
    });

    let start_line: Vec<String> = lines
        .next()?
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(str::to_owned)
        .collect();

    let mut fields: HashMap<String, String> = HashMap::new();
    let mut last_name: Option<String> = None;
    for line in lines {
        if line.is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            // Folded continuation of the previous field.
            if let Some(name) = &last_name {
                if let Some(value) = fields.get_mut(name) {
                    value.push(' ');
                    value.push_str(line.trim());
                }
            }
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_uppercase();
        fields.insert(name.clone(), value.trim().to_owned());
        last_name = Some(name);
    }

    Some(HeaderBlock {
        start_line,
        fields,
        body_start,
    })
}
