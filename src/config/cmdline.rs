//! Kernel command line tokenizing.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdlineItem {
    pub key: String,
    /// `None` for bare switches like `rw`, `Some("")` for `key=`
    pub value: Option<String>,
}

/// Split a kernel command line into `key[=value]` items. Quotes group
/// whitespace into a single word and are dropped from the result.
pub fn split(cmdline: &str) -> Vec<CmdlineItem> {
    let mut words = vec![];
    let mut word = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in cmdline.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => word.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            None => {
                word.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(word);
    }

    words
        .into_iter()
        .map(|word| match word.split_once('=') {
            Some((key, value)) => CmdlineItem {
                key: key.to_owned(),
                value: Some(value.to_owned()),
            },
            None => CmdlineItem {
                key: word,
                value: None,
            },
        })
        .collect()
}

pub fn parse_boolean(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "yes" | "y" | "true" | "t" | "on" => Some(true),
        "0" | "no" | "n" | "false" | "f" | "off" => Some(false),
        _ => None,
    }
}
