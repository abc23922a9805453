//! Read-only Twitch chat connection over IRC.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::time::Duration;

use clink_core::{ChatMessage, Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Longest wait between reconnect attempts, in seconds.
const MAX_RETRY_DELAY_SECS: u64 = 60;

/// A line received from the IRC server that the bot cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcLine {
    Ping(String),
    Message(ChatMessage),
    /// Server is about to drop the connection.
    Reconnect,
}

/// Parse one IRC line, ignoring anything that is not a ping, a channel
/// message, or a reconnect notice.
pub fn parse_line(line: &str) -> Option<IrcLine> {
    let line = line.trim_end_matches(['\r', '\n']);

    // Drop IRCv3 tags
    let line = match line.strip_prefix('@') {
        Some(tagged) => tagged.split_once(' ')?.1,
        None => line,
    };

    if let Some(payload) = line.strip_prefix("PING ") {
        return Some(IrcLine::Ping(payload.to_string()));
    }

    let (prefix, rest) = line.strip_prefix(':')?.split_once(' ')?;
    let (command, params) = rest.split_once(' ').unwrap_or((rest, ""));

    match command {
        "PRIVMSG" => {
            let username = prefix.split('!').next().filter(|u| !u.is_empty())?;
            let (_channel, text) = params.split_once(" :")?;
            Some(IrcLine::Message(ChatMessage::new(username, text)))
        }
        "RECONNECT" => Some(IrcLine::Reconnect),
        _ => None,
    }
}

/// Anonymous login name; Twitch accepts any `justinfan` nick without a token.
fn anonymous_nick() -> String {
    format!("justinfan{}", 10_000 + std::process::id() % 90_000)
}

/// Anonymous, read-only connection to one Twitch channel.
pub struct TwitchChat {
    address: String,
    channel: String,
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TwitchChat {
    /// Connect to `address` and join `channel`.
    pub async fn connect(address: &str, channel: &str) -> Result<Self> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| Error::Connect(format!("{address}: {e}")))?;
        let (reader, mut writer) = stream.into_split();

        let channel = channel.to_lowercase();
        let login = format!("NICK {}\r\nJOIN #{channel}\r\n", anonymous_nick());
        writer
            .write_all(login.as_bytes())
            .await
            .map_err(|e| Error::Connect(format!("{address}: {e}")))?;

        info!("Joined #{channel} on {address}");

        Ok(Self {
            address: address.to_string(),
            channel,
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    /// Forward channel messages to `tx` until the receiver goes away.
    ///
    /// `tx` should have a capacity of one so unread messages stay in the
    /// socket. Lost connections are re-established with exponential backoff.
    pub async fn run(mut self, tx: mpsc::Sender<ChatMessage>) -> Result<()> {
        loop {
            match self.pump(&tx).await {
                Ok(()) => {
                    debug!("Message receiver closed, leaving chat");
                    return Ok(());
                }
                Err(e) => warn!("Chat connection lost: {e}"),
            }

            let mut retry_delay = 1;
            self = loop {
                if tx.is_closed() {
                    return Ok(());
                }
                info!("Reconnecting to chat in {retry_delay}s...");
                tokio::time::sleep(Duration::from_secs(retry_delay)).await;
                retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY_SECS);

                match Self::connect(&self.address, &self.channel).await {
                    Ok(chat) => break chat,
                    Err(e) => warn!("Reconnect failed: {e}"),
                }
            };
        }
    }

    /// Read lines until the connection drops (`Err`) or `tx` closes (`Ok`).
    async fn pump(&mut self, tx: &mpsc::Sender<ChatMessage>) -> Result<()> {
        while let Some(line) = self
            .lines
            .next_line()
            .await
            .map_err(|e| Error::Chat(e.to_string()))?
        {
            match parse_line(&line) {
                Some(IrcLine::Ping(payload)) => {
                    self.writer
                        .write_all(format!("PONG {payload}\r\n").as_bytes())
                        .await
                        .map_err(|e| Error::Chat(e.to_string()))?;
                }
                Some(IrcLine::Message(message)) => {
                    if tx.send(message).await.is_err() {
                        return Ok(());
                    }
                }
                Some(IrcLine::Reconnect) => {
                    return Err(Error::Chat("server requested a reconnect".to_string()));
                }
                None => trace!("ignored: {line}"),
            }
        }

        Err(Error::Chat("connection closed by server".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_privmsg() {
        let line = ":alice!alice@alice.tmi.twitch.tv PRIVMSG #streamer :!ding\r\n";
        assert_eq!(
            parse_line(line),
            Some(IrcLine::Message(ChatMessage::new("alice", "!ding")))
        );
    }

    #[test]
    fn test_parse_tagged_privmsg() {
        let line = "@badge-info=;color=#FF0000;display-name=Bob :bob!bob@bob.tmi.twitch.tv PRIVMSG #streamer :hello :) there";
        assert_eq!(
            parse_line(line),
            Some(IrcLine::Message(ChatMessage::new("bob", "hello :) there")))
        );
    }

    #[test]
    fn test_parse_ping_and_reconnect() {
        assert_eq!(
            parse_line("PING :tmi.twitch.tv"),
            Some(IrcLine::Ping(":tmi.twitch.tv".to_string()))
        );
        assert_eq!(parse_line(":tmi.twitch.tv RECONNECT"), Some(IrcLine::Reconnect));
    }

    #[test]
    fn test_parse_ignores_other_lines() {
        assert!(parse_line(":tmi.twitch.tv 001 justinfan123 :Welcome, GLHF!").is_none());
        assert!(parse_line(":justinfan123!justinfan123@justinfan123.tmi.twitch.tv JOIN #streamer").is_none());
        assert!(parse_line("").is_none());
    }

    #[test]
    fn test_anonymous_nick() {
        assert!(anonymous_nick().starts_with("justinfan"));
    }

    #[tokio::test]
    async fn test_chat_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = socket.into_split();
            let mut lines = BufReader::new(reader).lines();

            let nick = lines.next_line().await.unwrap().unwrap();
            let join = lines.next_line().await.unwrap().unwrap();

            writer
                .write_all(
                    b"PING :tmi.twitch.tv\r\n:alice!alice@alice.tmi.twitch.tv PRIVMSG #streamer :!ding\r\n",
                )
                .await
                .unwrap();
            let pong = lines.next_line().await.unwrap().unwrap();
            (nick, join, pong, writer)
        });

        let chat = TwitchChat::connect(&address, "Streamer").await.unwrap();
        let (tx, mut rx) = mpsc::channel(1);
        let client = tokio::spawn(chat.run(tx));

        let message = rx.recv().await.unwrap();
        assert_eq!(message, ChatMessage::new("alice", "!ding"));

        let (nick, join, pong, _writer) = server.await.unwrap();
        assert!(nick.starts_with("NICK justinfan"));
        assert_eq!(join, "JOIN #streamer");
        assert_eq!(pong, "PONG :tmi.twitch.tv");

        drop(rx);
        client.abort();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = TwitchChat::connect(&address, "streamer").await;
        assert!(matches!(result, Err(Error::Connect(_))));
    }
}
