use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::Result;
use crate::shutdown::InFlightGate;
use crate::stream::publisher::{self, ExitResponse};
use crate::stream::request::{ParseError, SpawnRequest};
use crate::stream::{GROUP, READ_BATCH, SPAWN_STREAM};
use crate::worker::executor::{ExecStatus, Executor};

/// Owns the worker's consumer identity and delivers stream messages to
/// independent execution tasks.
pub struct Consumer {
    identity: Uuid,
    read_conn: MultiplexedConnection,
    publish_conn: MultiplexedConnection,
    executor: Arc<Executor>,
    drain: CancellationToken,
    gate: InFlightGate,
}

impl Consumer {
    pub fn new(
        read_conn: MultiplexedConnection,
        publish_conn: MultiplexedConnection,
        drain: CancellationToken,
        gate: InFlightGate,
    ) -> Self {
        Self {
            identity: Uuid::new_v4(),
            read_conn,
            publish_conn,
            executor: Arc::new(Executor::new()),
            drain,
            gate,
        }
    }

    /// The consumer name this worker registers within the group.
    pub fn identity(&self) -> Uuid {
        self.identity
    }

    /// Create the consumer group at the stream head; another worker having
    /// created it already (`BUSYGROUP`) is fine.
    async fn ensure_group(&mut self) -> Result<()> {
        let created: redis::RedisResult<()> = self
            .read_conn
            .xgroup_create_mkstream(SPAWN_STREAM, GROUP, "0-0")
            .await;

        match created {
            Ok(()) => Ok(()),
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read loop: block on the group read and spawn one execution task per
    /// message. Every message runs concurrently with all others; nothing
    /// here waits for executions to finish.
    ///
    /// A transport error is fatal: the loop returns and the process exits
    /// for the supervisor to restart. The loop never observes the drain
    /// token; shutdown tears the transport down with the process.
    pub async fn run(mut self) -> Result<()> {
        self.ensure_group().await?;

        tracing::info!(
            consumer = %self.identity,
            stream = SPAWN_STREAM,
            group = GROUP,
            "joined consumer group"
        );

        let options = StreamReadOptions::default()
            .group(GROUP, self.identity.to_string())
            .count(READ_BATCH)
            .block(0);

        loop {
            let reply: StreamReadReply = self
                .read_conn
                .xread_options(&[SPAWN_STREAM], &[">"], &options)
                .await?;

            for stream in reply.keys {
                for message in stream.ids {
                    tokio::spawn(handle_message(
                        self.publish_conn.clone(),
                        self.identity,
                        message,
                        self.executor.clone(),
                        self.drain.clone(),
                        self.gate.clone(),
                    ));
                }
            }
        }
    }
}

/// Execute one stream message end to end: parse, run, publish, ack.
async fn handle_message(
    mut conn: MultiplexedConnection,
    identity: Uuid,
    message: StreamId,
    executor: Arc<Executor>,
    drain: CancellationToken,
    gate: InFlightGate,
) {
    let message_id = message.id.clone();

    let request = match SpawnRequest::parse(&message) {
        Ok(request) => request,
        Err(ParseError::MissingId) => {
            tracing::warn!(message_id = %message_id, "message has no usable id, acknowledging without response");
            if let Err(e) = publisher::ack_only(&mut conn, &message_id).await {
                tracing::error!(message_id = %message_id, error = %e, "failed to acknowledge message");
            }
            return;
        }
        Err(ParseError::Rejected { request_id, reason }) => {
            tracing::warn!(request_id = %request_id, reason = %reason, "rejecting request");
            let response = ExitResponse::failure(request_id, identity, &reason.to_string());
            publish(&mut conn, &message_id, &response).await;
            return;
        }
    };

    // Holding the gate delays shutdown completion until this execution has
    // concluded, response included.
    let _in_flight = gate.register().await;

    match executor.execute(&request, &drain).await {
        Ok(ExecStatus::Completed(report)) => {
            let response = ExitResponse::from_report(request.request_id, report);
            publish(&mut conn, &request.message_id, &response).await;
        }
        Ok(ExecStatus::Drained) => {
            // Deliberately skip publication: the unacknowledged message
            // stays in the pending list for another consumer to reclaim.
            tracing::info!(request_id = %request.request_id, "execution aborted by drain");
        }
        Err(spawn_error) => {
            tracing::warn!(request_id = %request.request_id, error = %spawn_error, "failed to spawn child");
            let response =
                ExitResponse::failure(request.request_id, identity, &spawn_error.to_string());
            publish(&mut conn, &request.message_id, &response).await;
        }
    }
}

async fn publish(conn: &mut MultiplexedConnection, message_id: &str, response: &ExitResponse) {
    if let Err(e) = publisher::publish_and_ack(conn, message_id, response).await {
        tracing::error!(
            request_id = %response.id,
            message_id = %message_id,
            error = %e,
            "failed to publish response, message stays pending"
        );
    }
}
