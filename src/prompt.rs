use std::io::{self, BufRead, Write};

/// Interaction with the operator during a full authentication.
pub trait Prompter {
    /// Shows an informative message, such as the authorization url to open.
    fn show(&self, message: &str);
    fn prompt_password(&self, label: &str) -> io::Result<String>;
    fn prompt_text(&self, label: &str) -> io::Result<String>;
}

/// Prompts on stderr and reads answers from stdin, keeping stdout for the credential.
/// Passwords are read from the terminal without echo.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn ask(label: &str) -> io::Result<String> {
        let mut stderr = io::stderr().lock();
        write!(stderr, "{label} ")?;
        stderr.flush()?;
        read_answer(&mut io::stdin().lock())
    }
}

impl Prompter for TerminalPrompter {
    fn show(&self, message: &str) {
        eprintln!("{message}");
    }

    fn prompt_password(&self, label: &str) -> io::Result<String> {
        rpassword::prompt_password(format!("{label} "))
    }

    fn prompt_text(&self, label: &str) -> io::Result<String> {
        Self::ask(label)
    }
}

/// Reads one line, without its line terminator. End of input is an error.
fn read_answer<R: BufRead>(input: &mut R) -> io::Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "no input available",
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        pub Prompter {}

        impl Prompter for Prompter {
            fn show(&self, message: &str);
            fn prompt_password(&self, label: &str) -> io::Result<String>;
            fn prompt_text(&self, label: &str) -> io::Result<String>;
        }
    }

    #[test]
    fn answer_without_line_terminator() {
        let mut input = io::Cursor::new("https://app.example/cb?code=1\r\nnext\n");

        assert_eq!(
            read_answer(&mut input).unwrap(),
            "https://app.example/cb?code=1"
        );
        assert_eq!(read_answer(&mut input).unwrap(), "next");
    }

    #[test]
    fn closed_input_is_an_error() {
        let mut input = io::Cursor::new("");

        let error = read_answer(&mut input).unwrap_err();

        assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
    }
}
