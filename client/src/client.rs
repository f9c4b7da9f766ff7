// client.rs

use protocol::{read_line, write_request, Request, MSG, NICK, QUIT};
use std::{io, str::FromStr};
use tokio::{
    io::{AsyncBufRead, AsyncWriteExt, BufReader},
    net::{
        lookup_host,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    console::Console,
    error::{CommandError, ConnectError, SessionError, DISCONNECTED, GENERIC_FAILURE},
    running::Running,
    target::ConnectionTarget,
};

const HELP_TEXT: &str = r#"
Commands:
/nick <nickname>   set your nickname
/msg <message>     send a message to the chatroom
/quit              disconnect and exit
/help              show this list
"#;

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    Nick(String),
    Msg(String),
    Help,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_start();
        match line.split_whitespace().next() {
            Some(QUIT) => Ok(Command::Quit),
            Some(NICK) => match line.split_whitespace().collect::<Vec<_>>()[..] {
                [_, name] => Ok(Command::Nick(name.to_owned())),
                _ => Err(CommandError::Malformed),
            },
            // everything after the first space goes out untouched
            Some(MSG) => match line.split_once(' ') {
                Some((_, text)) if !text.is_empty() => Ok(Command::Msg(text.to_owned())),
                _ => Err(CommandError::Malformed),
            },
            Some("/help") => Ok(Command::Help),
            _ => Err(CommandError::Unknown),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Terminated,
}

/// Both halves of a freshly dialed stream.
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Resolves and dials `target` once. No retries and no timeout beyond the OS default.
pub async fn connect(target: &ConnectionTarget) -> Result<Connection, ConnectError> {
    let addrs = lookup_host((target.host(), target.port())).await.map_err(|e| {
        debug!(server = %target, error = %e, "name resolution failed");
        ConnectError::UnknownHost
    })?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!(%addr, error = %e, "could not disable nagle");
                }
                let (read_stream, write_stream) = stream.into_split();
                return Ok(Connection { reader: BufReader::new(read_stream), writer: write_stream });
            }
            Err(e) => {
                debug!(%addr, error = %e, "dial failed");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.map(ConnectError::from).unwrap_or(ConnectError::UnknownHost))
}

pub struct ChatClient<I> {
    target: ConnectionTarget,
    running: Running,
    console: Console,
    input: Option<I>,
    writer: Option<OwnedWriteHalf>,
    receiver: Option<JoinHandle<BufReader<OwnedReadHalf>>>,
    state: SessionState,
}

impl<I: AsyncBufRead + Unpin> ChatClient<I> {
    pub fn new(target: ConnectionTarget, input: I, console: Console) -> Self {
        ChatClient {
            target,
            running: Running::new(),
            console,
            input: Some(input),
            writer: None,
            receiver: None,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connects, starts the receive task and runs the command loop until the
    /// session ends. Nothing is started when the dial fails.
    pub async fn start(&mut self) -> Result<(), ConnectError> {
        if self.state != SessionState::Disconnected {
            debug!(state = ?self.state, "session already started");
            return Ok(());
        }

        let Connection { reader, writer } = match connect(&self.target).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(server = %self.target, error = ?e, "connect failed");
                self.console.failure(&e.to_string());
                self.stop().await;
                return Err(e);
            }
        };

        info!(server = %self.target, "connected");
        self.console.notice("Connected to the chat server.");
        self.state = SessionState::Connected;
        self.writer = Some(writer);
        self.receiver = Some(tokio::spawn(receive(reader, self.running.clone(), self.console.clone())));

        self.run().await;
        Ok(())
    }

    async fn run(&mut self) {
        while self.running.is_running() {
            self.console.prompt();

            let line = match self.next_line().await {
                Ok(Some(Ok(line))) => line,
                Ok(Some(Err(e))) => {
                    debug!("input line is not utf-8");
                    self.console.println(&e.to_string());
                    continue;
                }
                Ok(None) => {
                    debug!("input closed, quitting");
                    self.quit().await;
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "failed to read input");
                    self.console.failure(&format!("{GENERIC_FAILURE}\n{e}"));
                    self.quit().await;
                    break;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            match line.parse::<Command>() {
                Ok(Command::Quit) => self.quit().await,
                Ok(Command::Nick(name)) => self.send(Request::Nick(name)).await,
                Ok(Command::Msg(text)) => self.send(Request::Msg(text)).await,
                Ok(Command::Help) => self.console.notice(HELP_TEXT),
                Err(e) => {
                    debug!(%line, "rejected input");
                    self.console.println(&e.to_string());
                }
            }
        }
    }

    async fn next_line(&mut self) -> io::Result<Option<Result<String, CommandError>>> {
        match self.input.as_mut() {
            Some(input) => keyboard_line(input).await,
            None => Ok(None),
        }
    }

    async fn send(&mut self, request: Request) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };

        debug!(%request, "sending");
        let sent = write_request(writer, &request).await;
        if let Err(e) = sent {
            warn!(error = %e, "write failed");
            self.console.failure(&SessionError::from(e).to_string());
            self.stop().await;
        }
    }

    async fn quit(&mut self) {
        self.running.stop();
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = write_request(writer, &Request::Quit).await {
                debug!(error = %e, "could not deliver /quit");
            }
        }
        self.stop().await;
    }

    /// Tears the session down. Every resource is released even when an earlier
    /// release fails; failures are reported and then dropped. Calling it on a
    /// terminated session does nothing.
    pub async fn stop(&mut self) {
        if self.state == SessionState::Terminated {
            return;
        }
        self.running.stop();

        if let Some(mut writer) = self.writer.take() {
            match writer.shutdown().await {
                Ok(()) => {}
                // peer already tore the socket down
                Err(e) if e.kind() == io::ErrorKind::NotConnected => {
                    debug!(error = %e, "write half already closed");
                }
                Err(e) => self.release_failed("write half", &e),
            }
        }

        if let Some(receiver) = self.receiver.take() {
            match receiver.await {
                Ok(reader) => drop(reader),
                Err(e) => self.release_failed("receive task", &e),
            }
        }

        drop(self.input.take());

        self.state = SessionState::Terminated;
        info!(server = %self.target, "session closed");
    }

    fn release_failed(&self, what: &str, e: &dyn std::error::Error) {
        warn!(resource = what, error = %e, "release failed");
        self.console.failure(&format!("{GENERIC_FAILURE}\n{e}"));
    }
}

/// Reads one line of keyboard input. A line that is not UTF-8 is consumed and
/// comes back as `Malformed` so the caller can keep reading.
pub(crate) async fn keyboard_line<R>(input: &mut R) -> io::Result<Option<Result<String, CommandError>>>
where
    R: AsyncBufRead + Unpin,
{
    let Some(bytes) = read_line(input).await? else {
        return Ok(None);
    };
    Ok(Some(String::from_utf8(bytes).map_err(|_| CommandError::Malformed)))
}

/// Prints server lines until the session stops or the server goes away, then
/// hands the reader back so shutdown can release it.
async fn receive<R>(mut reader: R, running: Running, console: Console) -> R
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let read = tokio::select! {
            biased;
            _ = running.stopped() => break,
            read = read_line(&mut reader) => read,
        };

        match read {
            Ok(Some(line)) => console.server_line(&line),
            Ok(None) => {
                if running.is_running() {
                    info!("server closed the connection");
                    console.failure(DISCONNECTED);
                }
                break;
            }
            Err(e) => {
                if running.is_running() {
                    warn!(error = %e, "read failed");
                    console.failure(&SessionError::from(e).to_string());
                }
                break;
            }
        }
    }
    reader
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::capture::{self, Captured};
    use std::time::Duration;
    use tokio::{
        io::{duplex, DuplexStream},
        net::TcpListener,
        task::JoinHandle,
    };

    async fn listen() -> (TcpListener, ConnectionTarget) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, ConnectionTarget::new("127.0.0.1", port).unwrap())
    }

    /// Accepts one client, optionally greets it, then collects every line it
    /// sends until it closes its side.
    fn serve(listener: TcpListener, greeting: &'static [u8], hang_up: bool) -> JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = socket.into_split();
            write_half.write_all(greeting).await.unwrap();
            if hang_up {
                write_half.shutdown().await.unwrap();
            }

            let mut lines = Vec::new();
            let mut reader = BufReader::new(read_half);
            while let Some(line) = read_line(&mut reader).await.unwrap() {
                lines.push(String::from_utf8(line).unwrap());
            }
            lines
        })
    }

    async fn session(input: &'static [u8]) -> (Vec<String>, Captured, ChatClient<&'static [u8]>) {
        let (listener, target) = listen().await;
        let server = serve(listener, b"", false);
        let (console, captured) = capture::console();

        let mut client = ChatClient::new(target, input, console);
        client.start().await.unwrap();
        (server.await.unwrap(), captured, client)
    }

    async fn wait_for(captured: &Captured, needle: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !captured.text().contains(needle) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("console never showed {needle:?}: {:?}", captured.text()));
    }

    fn interactive(target: ConnectionTarget, console: Console) -> (DuplexStream, JoinHandle<ChatClient<BufReader<DuplexStream>>>) {
        let (keyboard, input) = duplex(1024);
        let handle = tokio::spawn(async move {
            let mut client = ChatClient::new(target, BufReader::new(input), console);
            client.start().await.unwrap();
            client
        });
        (keyboard, handle)
    }

    #[test]
    fn parses_commands() {
        assert_eq!("/quit".parse::<Command>(), Ok(Command::Quit));
        assert_eq!("/nick bob".parse::<Command>(), Ok(Command::Nick("bob".into())));
        assert_eq!("/msg hello  there ".parse::<Command>(), Ok(Command::Msg("hello  there ".into())));
        assert_eq!("/help".parse::<Command>(), Ok(Command::Help));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert_eq!("/nick".parse::<Command>(), Err(CommandError::Malformed));
        assert_eq!("/nick a b".parse::<Command>(), Err(CommandError::Malformed));
        assert_eq!("/msg".parse::<Command>(), Err(CommandError::Malformed));
        assert_eq!("/msg ".parse::<Command>(), Err(CommandError::Malformed));
        assert_eq!("hello".parse::<Command>(), Err(CommandError::Unknown));
        assert_eq!("/nickname bob".parse::<Command>(), Err(CommandError::Unknown));
    }

    #[tokio::test]
    async fn nick_sends_one_line() {
        let (sent, captured, _) = session(b"/nick bob\n/quit\n").await;
        assert_eq!(sent, ["/nick bob", "/quit"]);
        assert!(captured.text().contains("Connected to the chat server."));
        assert!(!captured.text().contains("Invalid command"));
    }

    #[tokio::test]
    async fn malformed_nick_sends_nothing() {
        let (sent, captured, _) = session(b"/nick\n/nick a b\n/quit\n").await;
        assert_eq!(sent, ["/quit"]);
        assert_eq!(captured.text().matches("Invalid command. Please try again.").count(), 2);
    }

    #[tokio::test]
    async fn msg_keeps_the_whole_remainder() {
        let (sent, _, _) = session(b"/msg hello there\n/msg\n/quit\n").await;
        assert_eq!(sent, ["/msg hello there", "/quit"]);
    }

    #[tokio::test]
    async fn unknown_input_is_reported_not_sent() {
        let (sent, captured, _) = session(b"hello\n\n/help\n/quit\n").await;
        assert_eq!(sent, ["/quit"]);
        let text = captured.text();
        assert!(text.contains("Unknown command."));
        assert!(text.contains("/nick <nickname>"));
    }

    #[tokio::test]
    async fn quit_is_the_last_line_sent() {
        let (sent, _, mut client) = session(b"/quit\n/msg too late\n").await;
        assert_eq!(sent, ["/quit"]);
        assert_eq!(client.state(), SessionState::Terminated);

        client.stop().await;
        assert_eq!(client.state(), SessionState::Terminated);
    }

    #[tokio::test]
    async fn closed_input_quits() {
        let (sent, _, client) = session(b"/msg bye").await;
        assert_eq!(sent, ["/msg bye", "/quit"]);
        assert_eq!(client.state(), SessionState::Terminated);
    }

    #[tokio::test]
    async fn non_utf8_input_is_rejected_and_the_loop_continues() {
        let (sent, captured, client) = session(b"/msg caf\xe9\n/nick bob\n/quit\n").await;
        assert_eq!(sent, ["/nick bob", "/quit"]);
        assert_eq!(client.state(), SessionState::Terminated);
        let text = captured.text();
        assert!(text.contains("Invalid command. Please try again."));
        assert!(!text.contains(GENERIC_FAILURE));
    }

    #[tokio::test]
    async fn failed_write_reports_disconnect_and_ends_session() {
        let (listener, target) = listen().await;
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });
        let (console, captured) = capture::console();

        let (mut keyboard, client) = interactive(target, console);
        server.await.unwrap();
        wait_for(&captured, DISCONNECTED).await;

        // the first write after the close only earns a reset; a later one fails
        for n in 0..200 {
            if client.is_finished() || keyboard.write_all(format!("/msg line {n}\n").as_bytes()).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let client = tokio::time::timeout(Duration::from_secs(5), client).await.unwrap().unwrap();
        assert_eq!(client.state(), SessionState::Terminated);
        assert!(client.input.is_none());
        assert!(client.writer.is_none());
        // once from the reader on close, once from the failed write
        assert_eq!(captured.text().matches(DISCONNECTED).count(), 2);
        assert!(keyboard.write_all(b"/msg after\n").await.is_err());
    }

    #[tokio::test]
    async fn release_failures_are_shown() {
        let target = ConnectionTarget::new("127.0.0.1", 9).unwrap();
        let (console, captured) = capture::console();
        let client = ChatClient::new(target, &b""[..], console);

        let e = io::Error::new(io::ErrorKind::Other, "close failed");
        client.release_failed("write half", &e);

        let text = captured.text();
        assert!(text.contains(GENERIC_FAILURE));
        assert!(text.contains("close failed"));
    }

    #[tokio::test]
    async fn server_lines_are_printed_verbatim() {
        let (listener, target) = listen().await;
        let server = serve(listener, b"hi \xff there\r\n  spaced  \n", false);
        let (console, captured) = capture::console();

        let (mut keyboard, client) = interactive(target, console);
        wait_for(&captured, "spaced").await;
        keyboard.write_all(b"/quit\n").await.unwrap();

        client.await.unwrap();
        assert_eq!(server.await.unwrap(), ["/quit"]);
        let bytes = captured.bytes();
        let expected: &[u8] = b"hi \xff there\n> ";
        assert!(bytes.windows(expected.len()).any(|w| w == expected));
        assert!(captured.text().contains("  spaced  \n> "));
    }

    #[tokio::test]
    async fn peer_close_is_reported_once_and_quit_still_works() {
        let (listener, target) = listen().await;
        let server = serve(listener, b"welcome\n", true);
        let (console, captured) = capture::console();

        let (mut keyboard, client) = interactive(target, console);
        wait_for(&captured, DISCONNECTED).await;
        keyboard.write_all(b"/quit\n").await.unwrap();

        let client = client.await.unwrap();
        assert_eq!(client.state(), SessionState::Terminated);
        assert_eq!(server.await.unwrap(), ["/quit"]);
        assert_eq!(captured.text().matches(DISCONNECTED).count(), 1);
        assert!(captured.text().contains("welcome\n> "));
    }

    #[tokio::test]
    async fn refused_connect_starts_nothing() {
        let (listener, target) = listen().await;
        drop(listener);
        let (console, captured) = capture::console();

        let mut client = ChatClient::new(target, &b"/nick bob\n"[..], console);
        let err = client.start().await.unwrap_err();

        assert!(matches!(err, ConnectError::ConnectionRefused));
        assert_eq!(client.state(), SessionState::Terminated);
        assert!(client.receiver.is_none());
        let text = captured.text();
        assert!(text.contains("Unable to connect to server. Please try again later."));
        assert!(!text.contains("> "));
    }

    #[tokio::test]
    async fn unresolvable_host_is_unknown_host() {
        let target = ConnectionTarget::new("no-such-host.invalid", 4000).unwrap();
        let err = connect(&target).await.err().unwrap();
        assert!(matches!(err, ConnectError::UnknownHost));
    }

    #[tokio::test]
    async fn receive_stops_on_signal_without_message() {
        let (console, captured) = capture::console();
        let running = Running::new();
        let (_server_side, client_side) = duplex(64);
        let task = tokio::spawn(receive(BufReader::new(client_side), running.clone(), console));

        running.stop();
        tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert!(captured.text().is_empty());
    }
}
