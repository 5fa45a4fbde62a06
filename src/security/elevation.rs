//! Administrator elevation check and self-relaunch

use tracing::{info, warn};

use crate::platform::{OsError, TokenApi};

/// Whether the process token is elevated.
pub fn is_elevated(token: &dyn TokenApi) -> bool {
    let elevated = token.is_elevated();
    if elevated {
        info!("Running with admin privileges");
    } else {
        warn!("Running without admin privileges");
    }
    elevated
}

/// Join arguments into one command line that `CommandLineToArgvW` splits
/// back into the same arguments.
pub fn quote_command_line<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = String::new();
    for (i, arg) in args.into_iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        quote_arg(arg.as_ref(), &mut line);
    }
    line
}

fn quote_arg(arg: &str, out: &mut String) {
    if !arg.is_empty() && !arg.contains([' ', '\t', '"']) {
        out.push_str(arg);
        return;
    }
    out.push('"');
    let mut backslashes = 0;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                // backslashes before a quote are doubled, then the quote escaped
                out.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
                out.push('"');
                backslashes = 0;
            }
            _ => {
                out.extend(std::iter::repeat('\\').take(backslashes));
                out.push(c);
                backslashes = 0;
            }
        }
    }
    // trailing backslashes precede the closing quote
    out.extend(std::iter::repeat('\\').take(backslashes * 2));
    out.push('"');
}

/// Start this executable again through the `runas` verb, which shows the
/// UAC consent prompt. The current process should exit afterwards.
pub fn relaunch_elevated() -> Result<(), OsError> {
    #[cfg(windows)]
    {
        use windows::core::PCWSTR;
        use windows::Win32::Foundation::HWND;
        use windows::Win32::UI::Shell::ShellExecuteW;
        use windows::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

        fn to_wide(s: &str) -> Vec<u16> {
            s.encode_utf16().chain(std::iter::once(0)).collect()
        }

        let exe = std::env::current_exe()?;
        let cwd = std::env::current_dir()?;
        let args = quote_command_line(
            std::env::args_os()
                .skip(1)
                .map(|a| a.to_string_lossy().into_owned()),
        );

        let verb = to_wide("runas");
        let exe = to_wide(&exe.to_string_lossy());
        let cwd = to_wide(&cwd.to_string_lossy());
        let args = to_wide(&args);

        let result = unsafe {
            ShellExecuteW(
                HWND::default(),
                PCWSTR(verb.as_ptr()),
                PCWSTR(exe.as_ptr()),
                PCWSTR(args.as_ptr()),
                PCWSTR(cwd.as_ptr()),
                SW_SHOWNORMAL,
            )
        };
        // ShellExecute returns a value greater than 32 on success
        let code = result.0 as isize;
        if code <= 32 {
            return Err(OsError::new(code as u32, "ShellExecute runas failed"));
        }
        info!("Relaunched elevated");
        Ok(())
    }
    #[cfg(not(windows))]
    {
        Err(OsError::not_supported("Elevated relaunch"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockSystem;

    #[test]
    fn test_is_elevated_reads_token() {
        assert!(is_elevated(&MockSystem::new()));
        assert!(!is_elevated(&MockSystem::new().not_elevated()));
    }

    #[test]
    fn test_quote_command_line_plain_args() {
        assert_eq!(quote_command_line(["daemon", "--interval", "30"]), "daemon --interval 30");
        assert_eq!(quote_command_line(Vec::<String>::new()), "");
    }

    #[test]
    fn test_quote_command_line_keeps_spaced_path_whole() {
        let line = quote_command_line(["--config", r"C:\My Dir\x.toml", "daemon"]);
        assert_eq!(line, r#"--config "C:\My Dir\x.toml" daemon"#);
    }

    #[test]
    fn test_quote_command_line_escapes_quotes_and_backslashes() {
        assert_eq!(quote_command_line([""]), "\"\"");
        assert_eq!(quote_command_line([r#"say "hi""#]), r#""say \"hi\"""#);
        assert_eq!(quote_command_line([r"C:\My Dir\"]), r#""C:\My Dir\\""#);
        assert_eq!(quote_command_line([r#"a\"b"#]), r#""a\\\"b""#);
        // backslashes not before a quote stay as they are
        assert_eq!(quote_command_line([r"C:\dir\x.toml"]), r"C:\dir\x.toml");
    }

    #[cfg(not(windows))]
    #[test]
    fn test_relaunch_unsupported_off_windows() {
        let err = relaunch_elevated().unwrap_err();
        assert_eq!(err.code, crate::platform::ERROR_NOT_SUPPORTED);
    }
}
