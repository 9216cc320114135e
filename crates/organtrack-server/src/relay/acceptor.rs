use std::future::Future;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::relay::handler::handle_connection;
use crate::state::AppState;

/// Accept connections until `shutdown` resolves, one relay task per peer.
///
/// On shutdown every live connection is cancelled.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let connections = CancellationToken::new();
    tokio::pin!(shutdown);

    tracing::info!("Listening on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutting down relay");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    tokio::spawn(handle_connection(
                        stream,
                        remote,
                        state.clone(),
                        connections.child_token(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                }
            },
        }
    }

    connections.cancel();
    Ok(())
}
