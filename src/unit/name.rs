//! systemd unit name escaping.

use anyhow::{bail, Result};

/// Escape a string for use as (part of) a unit name. `/` becomes `-`, a
/// leading `.` and every byte that is not alphanumeric, `:`, `_` or `.`
/// becomes a C-style `\xNN` escape.
pub fn unit_name_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for (i, byte) in s.bytes().enumerate() {
        match byte {
            b'/' => escaped.push('-'),
            b'.' if i == 0 => escaped.push_str("\\x2e"),
            b if b.is_ascii_alphanumeric() || matches!(b, b':' | b'_' | b'.') => {
                escaped.push(char::from(b))
            }
            b => escaped.push_str(&format!("\\x{b:02x}")),
        }
    }
    escaped
}

/// Escape an absolute path, e.g. `/dev/disk/by-label/home` into
/// `dev-disk-by\x2dlabel-home`. The root directory is `-`.
pub fn unit_name_path_escape(path: &str) -> Result<String> {
    if !path.starts_with('/') {
        bail!("Path {path:?} is not absolute");
    }

    let components = path
        .split('/')
        .filter(|component| !component.is_empty())
        .collect::<Vec<_>>();
    if components.iter().any(|component| *component == "..") {
        bail!("Path {path:?} is not normalized");
    }

    if components.is_empty() {
        return Ok("-".to_owned());
    }

    Ok(unit_name_escape(&components.join("/")))
}

/// `/home` with `.mount` gives `home.mount`.
pub fn unit_name_from_path(path: &str, suffix: &str) -> Result<String> {
    Ok(format!("{}{suffix}", unit_name_path_escape(path)?))
}

/// `systemd-fsck`, `/dev/sda3` and `.service` give
/// `systemd-fsck@dev-sda3.service`.
pub fn unit_name_from_path_instance(prefix: &str, path: &str, suffix: &str) -> Result<String> {
    Ok(format!("{prefix}@{}{suffix}", unit_name_path_escape(path)?))
}

pub fn unit_name_build(prefix: &str, instance: &str, suffix: &str) -> String {
    format!("{prefix}@{instance}{suffix}")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("home", "home")]
    #[case("srv", "srv")]
    #[case("foo-bar", "foo\\x2dbar")]
    #[case(".hidden", "\\x2ehidden")]
    #[case("a.b:c_d", "a.b:c_d")]
    #[case("back\\slash", "back\\x5cslash")]
    #[case("with space", "with\\x20space")]
    #[case("ü", "\\xc3\\xbc")]
    fn test_unit_name_escape(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(unit_name_escape(input), expected);
    }

    #[rstest]
    #[case("/", ".mount", "-.mount")]
    #[case("/home", ".mount", "home.mount")]
    #[case("/home/", ".mount", "home.mount")]
    #[case("//srv//data", ".mount", "srv-data.mount")]
    #[case("/dev/sda2", ".device", "dev-sda2.device")]
    #[case("/dev/mapper/home", ".device", "dev-mapper-home.device")]
    #[case("/dev/gpt-auto-root", ".device", "dev-gpt\\x2dauto\\x2droot.device")]
    #[case("/dev/nvme0n1p3", ".swap", "dev-nvme0n1p3.swap")]
    #[case("/boot", ".automount", "boot.automount")]
    fn test_unit_name_from_path(
        #[case] path: &str,
        #[case] suffix: &str,
        #[case] expected: &str,
    ) -> Result<()> {
        assert_eq!(unit_name_from_path(path, suffix)?, expected);
        Ok(())
    }

    #[test]
    fn test_unit_name_from_bad_path() {
        assert!(unit_name_from_path("home", ".mount").is_err());
        assert!(unit_name_from_path("", ".mount").is_err());
        assert!(unit_name_from_path("/srv/../etc", ".mount").is_err());
    }

    #[test]
    fn test_unit_name_from_path_instance() -> Result<()> {
        assert_eq!(
            unit_name_from_path_instance("systemd-fsck", "/dev/sda3", ".service")?,
            "systemd-fsck@dev-sda3.service"
        );
        assert_eq!(
            unit_name_build("systemd-cryptsetup", &unit_name_escape("home"), ".service"),
            "systemd-cryptsetup@home.service"
        );
        Ok(())
    }
}
