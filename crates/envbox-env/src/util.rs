/// Single-quote a string for safe embedding in a remote `bash -c`
/// invocation: every project path and user-supplied argv token passes
/// through here before it is interpolated into a command string sent
/// over the Remote Channel.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

pub fn quote_argv(argv: &[String]) -> String {
    argv.iter().map(|a| shell_quote(a)).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_embedded_single_quotes() {
        assert_eq!(shell_quote("it's here"), "'it'\\''s here'");
    }

    #[test]
    fn quotes_plain_paths_unchanged_in_content() {
        assert_eq!(shell_quote("/Users/alice/my-project"), "'/Users/alice/my-project'");
    }
}
