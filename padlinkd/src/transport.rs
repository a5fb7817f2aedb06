//! TCP front end: one line of JSON in, one line of JSON out.

use crate::runtime::DaemonHandle;
use padlink::action::{classify, normalize};
use padlink::dispatch::Flow;
use padlink::protocol::{Request, Response};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

/// Which chat messages this daemon answers to. `None` admits anything.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub guild: Option<String>,
    pub channel: Option<String>,
}

impl Scope {
    /// `Err` carries the reason a message is out of scope.
    pub fn admits(&self, guild: Option<&str>, channel: Option<&str>) -> Result<(), String> {
        if let Some(want) = self.guild.as_deref() {
            if guild != Some(want) {
                return Err(format!("guild {:?} is not {want:?}", guild.unwrap_or("")));
            }
        }
        if let Some(want) = self.channel.as_deref() {
            if channel != Some(want) {
                return Err(format!("channel {:?} is not {want:?}", channel.unwrap_or("")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Context {
    pub handle: DaemonHandle,
    pub scope: Scope,
}

pub async fn handle_request(ctx: &Context, request: Request) -> Response {
    match request {
        Request::Status => Response::Status(ctx.handle.status()),
        Request::Message {
            guild,
            channel,
            content,
        } => {
            if let Err(reason) = ctx.scope.admits(guild.as_deref(), channel.as_deref()) {
                debug!("ignored message: {}", reason);
                return Response::Ignored { reason };
            }
            let action = classify(&normalize(&content));
            if ctx.handle.dispatch(action).await == Flow::Terminate {
                info!("Message {:?} terminated the daemon", content);
            }
            // Every in-scope message is removed from the channel, valid or not.
            Response::Handled {
                action,
                delete: true,
            }
        }
    }
}

async fn handle_client(stream: TcpStream, ctx: Context) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handle_request(&ctx, request).await,
            Err(e) => Response::Error {
                message: format!("Invalid request: {}", e),
            },
        };
        writer
            .write_all(serde_json::to_string(&response)?.as_bytes())
            .await?;
        writer.write_all(b"\n").await?;
    }

    Ok(())
}

/// Accept clients until shutdown is requested.
pub async fn serve(listener: TcpListener, ctx: Context) -> std::io::Result<()> {
    let shutdown = ctx.handle.shutdown_token().clone();
    loop {
        let (stream, addr) = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            accepted = listener.accept() => accepted?,
        };
        info!("Client connected: {}", addr);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, ctx).await {
                error!("Client handler error: {}", e);
            }
        });
    }
}
