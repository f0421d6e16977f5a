//! The remote-control command protocol.
//!
//! Connection-oriented, single-shot plain text: each inbound connection
//! carries exactly one space-separated command, and only the two read
//! commands get a reply before the server closes the connection.
//! Unrecognized verbs, malformed arguments, and out-of-range values are
//! dropped silently; the existing client tooling relies on that laxity.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_util::sync::CancellationToken;

use crate::alarm::AlarmState;
use crate::error::{Error, Result};
use crate::store::{PrefField, Preferences, PreferenceStore};
use crate::tracing::prelude::*;

/// Matches the client side's single 1 KiB receive.
const MAX_REQUEST_BYTES: usize = 1024;

/// A stalled client may hold the acceptor for at most this long.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetAlarmState,
    SetAlarmState(i64),
    SetActiveState(i64),
    SetWakeupHour(i64),
    SetWakeupMinute(i64),
    SetWakeupWindow(i64),
    SetUtcOffset(i64),
    GetUserPreferences,
}

impl Command {
    /// Parse a request line. Extra trailing tokens are ignored.
    pub fn parse(input: &str) -> Result<Self> {
        let mut tokens = input.split_whitespace();
        let verb = tokens.next().ok_or(Error::MalformedCommand)?;
        let command = match verb {
            "get_alarm_state" => Self::GetAlarmState,
            "get_user_preferences" => Self::GetUserPreferences,
            "set_alarm_state" => Self::SetAlarmState(int_arg(&mut tokens)?),
            "set_active_state" => Self::SetActiveState(int_arg(&mut tokens)?),
            "set_wakeup_hour" => Self::SetWakeupHour(int_arg(&mut tokens)?),
            "set_wakeup_minute" => Self::SetWakeupMinute(int_arg(&mut tokens)?),
            "set_wakeup_window" => Self::SetWakeupWindow(int_arg(&mut tokens)?),
            "set_utc_offset" => Self::SetUtcOffset(int_arg(&mut tokens)?),
            _ => return Err(Error::MalformedCommand),
        };
        Ok(command)
    }
}

fn int_arg<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<i64> {
    tokens
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or(Error::MalformedCommand)
}

/// Wire form of the preference record: a mapping literal in stored field
/// order, flags as 0/1.
pub fn wire_encoding(prefs: &Preferences) -> String {
    format!(
        "{{'wakeup_hour': {}, 'wakeup_minute': {}, 'utc_offset': {}, 'wakeup_window': {}, 'active_state': {}}}",
        prefs.wakeup_hour,
        prefs.wakeup_minute,
        prefs.utc_offset,
        prefs.wakeup_window,
        u8::from(prefs.active_state),
    )
}

pub struct CommandServer {
    listener: TcpListener,
    store: PreferenceStore,
    alarm: AlarmState,
}

impl CommandServer {
    pub async fn bind(
        addr: impl ToSocketAddrs,
        store: PreferenceStore,
        alarm: AlarmState,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            store,
            alarm,
        })
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop. Connections are handled one at a time; each command
    /// amounts to a single store access, and the read timeout bounds how
    /// long one client can occupy the loop.
    pub async fn run(self, running: CancellationToken) {
        trace!("command server task started");
        loop {
            tokio::select! {
                _ = running.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "connection established");
                        if let Err(e) = self.serve(stream).await {
                            debug!(%peer, error = %e, "connection dropped");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
            }
        }
        trace!("command server task stopped");
    }

    async fn serve(&self, mut stream: TcpStream) -> io::Result<()> {
        let mut buf = [0u8; MAX_REQUEST_BYTES];
        let n = tokio::time::timeout(READ_TIMEOUT, stream.read(&mut buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "request read timed out"))??;

        let Ok(request) = std::str::from_utf8(&buf[..n]) else {
            debug!("ignoring non-UTF-8 request");
            return Ok(());
        };
        let command = match Command::parse(request) {
            Ok(command) => command,
            Err(_) => {
                debug!(request, "ignoring unrecognized command");
                return Ok(());
            }
        };

        match command {
            Command::GetAlarmState => {
                let body = if self.alarm.is_ringing() { "1" } else { "0" };
                stream.write_all(body.as_bytes()).await?;
            }
            Command::GetUserPreferences => {
                let body = wire_encoding(&self.store.snapshot());
                stream.write_all(body.as_bytes()).await?;
            }
            Command::SetAlarmState(value) => match value {
                0 => self.alarm.silence(),
                1 => self.alarm.set_ringing(true),
                _ => debug!(value, "ignoring out-of-range alarm state"),
            },
            Command::SetActiveState(value) => self.apply(PrefField::ActiveState, value),
            Command::SetWakeupHour(value) => self.apply(PrefField::WakeupHour, value),
            Command::SetWakeupMinute(value) => self.apply(PrefField::WakeupMinute, value),
            Command::SetWakeupWindow(value) => self.apply(PrefField::WakeupWindow, value),
            Command::SetUtcOffset(value) => self.apply(PrefField::UtcOffset, value),
        }
        Ok(())
    }

    fn apply(&self, field: PrefField, value: i64) {
        if let Err(e) = self.store.set(field, value) {
            debug!(error = %e, "dropping set request");
        }
    }
}
