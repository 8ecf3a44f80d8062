use std::io;

/// Turns terminal echo off for stdin until dropped
///
/// Does nothing when stdin is not a terminal (piped input, tests).
pub struct EchoGuard {
    #[cfg(unix)]
    saved: Option<libc::termios>,
}

impl EchoGuard {
    #[cfg(unix)]
    pub fn disable_stdin() -> io::Result<Self> {
        let fd = libc::STDIN_FILENO;

        // SAFETY: isatty only inspects the descriptor.
        if unsafe { libc::isatty(fd) } != 1 {
            return Ok(Self { saved: None });
        }

        let mut original = std::mem::MaybeUninit::<libc::termios>::uninit();
        // SAFETY: tcgetattr fully initialises `original` when it returns 0.
        let original = unsafe {
            if libc::tcgetattr(fd, original.as_mut_ptr()) != 0 {
                return Err(io::Error::last_os_error());
            }
            original.assume_init()
        };

        let silent = silenced(original);

        // SAFETY: `silent` is a valid termios copied from the current settings.
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &silent) } != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            saved: Some(original),
        })
    }

    #[cfg(not(unix))]
    pub fn disable_stdin() -> io::Result<Self> {
        tracing::warn!("Secret input will be visible: echo control is unsupported on this platform");
        Ok(Self {})
    }
}

/// `settings` with all input echo turned off, newline included
///
/// The caller prints the newline itself once the secret has been read.
#[cfg(unix)]
fn silenced(mut settings: libc::termios) -> libc::termios {
    settings.c_lflag &= !(libc::ECHO | libc::ECHONL);
    settings
}

#[cfg(unix)]
impl Drop for EchoGuard {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.as_ref() {
            // SAFETY: restores the settings captured in `disable_stdin`.
            unsafe {
                libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, saved);
            }
        }
    }
}
