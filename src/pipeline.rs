//! Per-query transaction pipeline.
//!
//! Turns one inbound packet into exactly one outbound packet: the upstream's
//! answer relayed unchanged, a REFUSED response, or a SERVFAIL indication.
//! Every stage reports through the transaction log, which brackets the whole
//! run, and there is no retry anywhere - a failure either becomes one of the
//! two negative response shapes or, if even that send fails, is abandoned
//! with the failure logged.

use std::net::SocketAddr;
use std::time::Instant;

use tokio::net::UdpSocket;

use crate::dns::{self, Header, RCODE_REFUSED, RCODE_SERVFAIL};
use crate::error::RelayError;
use crate::filter::{QueryFilter, Verdict};
use crate::qlog::{Level, Token, TransactionLog};
use crate::stats::{Stats, StatsSnapshot};
use crate::upstream::Upstream;

/// Shared collaborators for every transaction.
pub struct Pipeline {
    upstream: Upstream,
    filter: Box<dyn QueryFilter>,
    qlog: TransactionLog,
    stats: Stats,
}

impl Pipeline {
    pub fn new(upstream: Upstream, filter: Box<dyn QueryFilter>) -> Self {
        Self {
            upstream,
            filter,
            qlog: TransactionLog::new(),
            stats: Stats::new(),
        }
    }

    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        self.stats.snapshot_and_reset()
    }

    /// Transactions currently between open and close.
    pub fn in_flight(&self) -> usize {
        self.qlog.pending()
    }

    /// Run one inbound packet to completion.
    ///
    /// `socket` is the listening socket used to answer `peer`. Exactly one
    /// datagram goes back to the sender unless the final send itself fails,
    /// in which case the failure is logged and the transaction is abandoned.
    pub async fn handle(&self, socket: &UdpSocket, peer: SocketAddr, packet: &[u8]) {
        let started = Instant::now();

        // Best-effort ID peek so the transaction log opens even for packets
        // that never parse.
        let (wire_id, id_ok) = match dns::transaction_id(packet) {
            Ok(id) => (id, true),
            Err(_) => (0, false),
        };
        let token = self.qlog.open(wire_id);

        let result = if id_ok {
            self.process(socket, peer, packet, token).await
        } else {
            Err(RelayError::infra("transaction id unreadable"))
        };

        match result {
            Ok(()) => {
                self.stats.record_relayed(elapsed_ms(started));
            }
            Err(err) if err.is_refusal() => {
                self.qlog.append(token, err.to_string(), Level::Warning);
                match self.send_refusal(socket, peer, packet).await {
                    Ok(()) => {
                        self.qlog.append(token, "refusal sent", Level::Info);
                        self.stats.record_refused(elapsed_ms(started));
                    }
                    Err(err) => {
                        self.qlog
                            .append(token, format!("refusal not sent: {err}"), Level::Error);
                        self.send_failure(socket, peer, wire_id, token).await;
                        self.stats.record_failed(elapsed_ms(started));
                    }
                }
            }
            Err(err) => {
                self.qlog.append(token, err.to_string(), Level::Error);
                self.send_failure(socket, peer, wire_id, token).await;
                self.stats.record_failed(elapsed_ms(started));
            }
        }

        self.qlog.close(token);
    }

    /// Validation, upstream resolution, and relay - the pipeline's happy
    /// path. Any error is dispatched by the caller on its classification.
    async fn process(
        &self,
        socket: &UdpSocket,
        peer: SocketAddr,
        packet: &[u8],
        token: Token,
    ) -> Result<(), RelayError> {
        let (header, questions) = dns::decode_query(packet)?;
        self.qlog.append(
            token,
            format!("query decoded with {} question(s)", questions.len()),
            Level::Info,
        );

        if questions.len() != 1 {
            return Err(RelayError::refused(format!(
                "expected one question, got {}",
                questions.len()
            )));
        }
        let question = &questions[0];
        self.qlog.append(
            token,
            format!(
                "question {} type {} class {}",
                question.name, question.qtype, question.qclass
            ),
            Level::Info,
        );

        if self.filter.evaluate(question) == Verdict::Deny {
            return Err(RelayError::refused(format!(
                "query for {} denied by policy",
                question.name
            )));
        }

        let outbound = dns::encode(&header, Some(question))?;
        let reply = self.upstream.resolve(&outbound).await?;
        self.qlog.append(
            token,
            format!("upstream replied with {} bytes", reply.len()),
            Level::Info,
        );

        // Structural check only; the reply is relayed byte for byte, never
        // re-encoded from the parsed form.
        let (reply_header, answers) = dns::decode_response(&reply)?;
        self.qlog.append(
            token,
            format!(
                "response rcode {} with {} answer(s)",
                reply_header.rcode(),
                answers.len()
            ),
            Level::Info,
        );

        socket
            .send_to(&reply, peer)
            .await
            .map_err(|e| RelayError::infra(format!("response send: {e}")))?;
        self.qlog.append(token, "response relayed", Level::Info);

        Ok(())
    }

    /// Echo the refused query back with RCODE REFUSED and the response flag
    /// set. Any failure here is the caller's cue to fall through to the
    /// server-failure path.
    async fn send_refusal(
        &self,
        socket: &UdpSocket,
        peer: SocketAddr,
        packet: &[u8],
    ) -> Result<(), RelayError> {
        let (mut header, questions) = dns::decode_query(packet)?;
        header.set_response(true);
        header.set_rcode(RCODE_REFUSED);

        let response = dns::encode(&header, questions.first())?;
        socket
            .send_to(&response, peer)
            .await
            .map_err(|e| RelayError::infra(format!("refusal send: {e}")))?;

        Ok(())
    }

    /// Header-only SERVFAIL carrying whatever transaction ID could be
    /// extracted. A send failure here is terminal: logged, not retried.
    async fn send_failure(&self, socket: &UdpSocket, peer: SocketAddr, wire_id: u16, token: Token) {
        let mut header = Header {
            id: wire_id,
            flags: 0,
            qdcount: 0,
            ancount: 0,
            nscount: 0,
            arcount: 0,
        };
        header.set_response(true);
        header.set_rcode(RCODE_SERVFAIL);

        let response = match dns::encode(&header, None) {
            Ok(r) => r,
            Err(err) => {
                self.qlog
                    .append(token, format!("server failure not built: {err}"), Level::Error);
                return;
            }
        };

        match socket.send_to(&response, peer).await {
            Ok(_) => self.qlog.append(token, "server failure sent", Level::Info),
            Err(err) => self.qlog.append(
                token,
                format!("server failure not sent: {err}"),
                Level::Error,
            ),
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
