use std::path::{Component, Path, PathBuf};

/// One line of `/etc/fstab`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FstabEntry {
    pub spec: String,
    pub file: String,
    pub vfstype: String,
    pub options: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fstab {
    pub entries: Vec<FstabEntry>,
}

impl Fstab {
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let mut fields = line.split_whitespace().map(unescape_octal);
                Some(FstabEntry {
                    spec: fields.next()?,
                    file: fields.next()?,
                    vfstype: fields.next().unwrap_or_else(|| "auto".to_owned()),
                    options: fields.next().unwrap_or_else(|| "defaults".to_owned()),
                })
            })
            .collect();

        Self { entries }
    }

    pub fn has_fstype(&self, fstype: &str) -> bool {
        self.entries.iter().any(|entry| entry.vfstype == fstype)
    }

    pub fn is_mount_point(&self, path: &Path) -> bool {
        let path = normalize(path);
        self.entries
            .iter()
            .any(|entry| normalize(Path::new(&entry.file)) == path)
    }
}

/// fstab encodes whitespace in fields as `\040`-style octal escapes.
fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let digits = bytes.get(i + 1..i + 4);
        if bytes[i] == b'\\' {
            if let Some(digits) = digits.filter(|d| d.iter().all(|b| (b'0'..=b'7').contains(b))) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    result.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        result.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&result).into_owned()
}

/// Drop duplicate and trailing slashes and `.` components.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}
