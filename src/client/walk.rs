//! Subtree walk over GETBULK (v2c, v3) or GETNEXT (v1).

use std::collections::VecDeque;
use std::future::{Future, poll_fn};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::error::{Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::pdu::Pdu;
use crate::transport::Transport;
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

use super::Client;

/// In-flight request. The client travels with it and comes back on completion.
type Fetch<'a, T> = Pin<Box<dyn Future<Output = (&'a mut Client<T>, Result<Option<Vec<VarBind>>>)> + Send + 'a>>;

enum State<'a, T: Transport> {
    Idle(&'a mut Client<T>),
    Fetching(Fetch<'a, T>),
    Closed,
}

/// Lazy walk of the subtree under a root OID.
///
/// Created by [`Client::walk()`]. A [`Stream`] of bindings that holds the
/// client mutably for its whole life and issues one request each time its
/// buffer runs dry. Dropping the walk mid-request abandons that request.
///
/// The walk ends when a binding leaves the subtree, when the agent answers
/// with an exception value (endOfMibView, noSuchObject, noSuchInstance),
/// with an empty binding list, or (v1) with noSuchName. A binding that
/// does not sort after the previous one ends the walk with
/// [`Error::NonIncreasingOid`]. After the first `None` or error the stream
/// keeps returning `None`.
///
/// ```rust,no_run
/// # use syno_snmp::{Client, oid};
/// # async fn example() -> syno_snmp::Result<()> {
/// # let mut client = Client::v2c("192.168.1.10").connect().await?;
/// let mut walk = client.walk(oid!(1, 3, 6, 1, 4, 1, 6574, 2, 1, 1, 6));
/// while let Some(vb) = walk.next().await {
///     let vb = vb?;
///     println!("{} = {}", vb.oid, vb.value);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Walk<'a, T: Transport> {
    state: State<'a, T>,
    root: Oid,
    cursor: Oid,
    buffer: VecDeque<VarBind>,
    requests: u32,
    done: bool,
}

impl<'a, T: Transport + 'a> Walk<'a, T> {
    pub(super) fn new(client: &'a mut Client<T>, root: Oid) -> Self {
        Self {
            state: State::Idle(client),
            cursor: root.clone(),
            root,
            buffer: VecDeque::new(),
            requests: 0,
            done: false,
        }
    }

    pub fn root(&self) -> &Oid {
        &self.root
    }

    /// Requests sent so far.
    pub fn requests(&self) -> u32 {
        self.requests
    }

    /// Next binding; shorthand for polling the stream.
    pub async fn next(&mut self) -> Option<Result<VarBind>> {
        poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// Drain the walk, stopping at the first error.
    pub async fn collect(mut self) -> Result<Vec<VarBind>> {
        let mut results = Vec::new();
        while let Some(vb) = self.next().await {
            results.push(vb?);
        }
        Ok(results)
    }

    /// Like [`next`](Self::next), as `(dotted OID, value)`.
    pub async fn next_entry(&mut self) -> Option<Result<(String, Value)>> {
        self.next()
            .await
            .map(|r| r.map(|vb| (vb.oid.to_string(), vb.value)))
    }

    fn finish(&mut self) -> Option<Result<VarBind>> {
        self.done = true;
        self.buffer.clear();
        None
    }

    /// Check one buffered binding against the subtree and the cursor.
    fn admit(&mut self, vb: VarBind) -> Option<Result<VarBind>> {
        if !vb.oid.starts_with(&self.root) || vb.value.is_exception() {
            tracing::debug!(
                target: "syno_snmp::client",
                { snmp.oid = %vb.oid, snmp.requests = self.requests },
                "walk finished"
            );
            return self.finish();
        }
        if vb.oid <= self.cursor {
            tracing::warn!(
                target: "syno_snmp::client",
                { previous = %self.cursor, current = %vb.oid },
                "agent returned non-increasing OID"
            );
            self.done = true;
            self.buffer.clear();
            return Some(Err(Error::NonIncreasingOid {
                previous: std::mem::replace(&mut self.cursor, Oid::empty()),
                current: vb.oid,
            }));
        }
        self.cursor = vb.oid.clone();
        Some(Ok(vb))
    }

    fn start_fetch(&mut self, client: &'a mut Client<T>) -> Fetch<'a, T> {
        self.requests += 1;
        let cursor = self.cursor.clone();
        Box::pin(async move {
            let result = fetch(&mut *client, cursor).await;
            (client, result)
        })
    }
}

impl<'a, T: Transport + 'a> Stream for Walk<'a, T> {
    type Item = Result<VarBind>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if this.done {
                return Poll::Ready(None);
            }
            if let Some(vb) = this.buffer.pop_front() {
                return Poll::Ready(this.admit(vb));
            }

            let mut fetch = match std::mem::replace(&mut this.state, State::Closed) {
                State::Idle(client) => this.start_fetch(client),
                State::Fetching(fetch) => fetch,
                State::Closed => return Poll::Ready(this.finish()),
            };
            let (client, result) = match fetch.as_mut().poll(cx) {
                Poll::Pending => {
                    this.state = State::Fetching(fetch);
                    return Poll::Pending;
                }
                Poll::Ready(done) => done,
            };
            this.state = State::Idle(client);

            match result {
                Ok(Some(varbinds)) => this.buffer.extend(varbinds),
                Ok(None) => return Poll::Ready(this.finish()),
                Err(e) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
            }
        }
    }
}

/// One request past `cursor`. `Ok(None)` means the agent has nothing more.
async fn fetch<T: Transport>(client: &mut Client<T>, cursor: Oid) -> Result<Option<Vec<VarBind>>> {
    let version = client.version();
    let oids = std::slice::from_ref(&cursor);
    let pdu = if version.supports_bulk() {
        Pdu::get_bulk(0, 0, client.config.max_repetitions, oids)
    } else {
        Pdu::get_next_request(0, oids)
    };

    let response = client.request(pdu).await?;
    if response.is_error() {
        let status = response.error_status_enum();
        if version == Version::V1 && status == ErrorStatus::NoSuchName {
            tracing::debug!(target: "syno_snmp::client", "walk ended with noSuchName");
            return Ok(None);
        }
        return client.check_status(response).map(|_| None);
    }
    if response.varbinds.is_empty() {
        return Ok(None);
    }
    Ok(Some(response.varbinds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::transport::{MockTransport, ResponseBuilder};
    use crate::message::Message;
    use crate::pdu::PduType;
    use bytes::Bytes;

    fn disk_temp(index: u32) -> Oid {
        oid!(1, 3, 6, 1, 4, 1, 6574, 2, 1, 1, 6, index)
    }

    fn root() -> Oid {
        oid!(1, 3, 6, 1, 4, 1, 6574, 2, 1, 1, 6)
    }

    fn mock() -> MockTransport {
        MockTransport::new("192.0.2.1:161".parse().unwrap())
    }

    async fn poll_walk<T: Transport>(walk: &mut Walk<'_, T>) -> Option<Result<VarBind>> {
        poll_fn(|cx: &mut Context<'_>| Pin::new(&mut *walk).poll_next(cx)).await
    }

    async fn drain<S: Stream<Item = Result<VarBind>> + Unpin>(mut stream: S) -> Result<Vec<VarBind>> {
        let mut results = Vec::new();
        while let Some(item) = poll_fn(|cx: &mut Context<'_>| Pin::new(&mut stream).poll_next(cx)).await {
            results.push(item?);
        }
        Ok(results)
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_walk_stops_at_end_of_mib_view() {
        let mock = mock();
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(disk_temp(0), Value::Integer(35))
                .varbind(disk_temp(1), Value::Integer(37))
                .build_v2c(b"public"),
        );
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(disk_temp(2), Value::Integer(36))
                .varbind(disk_temp(3), Value::EndOfMibView)
                .build_v2c(b"public"),
        );
        let mut client = Client::v2c("192.0.2.1").max_repetitions(2).build(mock.clone());
        let results = drain(client.walk(root())).await.unwrap();
        let temps: Vec<_> = results.iter().map(|vb| vb.value.as_i32().unwrap()).collect();
        assert_eq!(temps, vec![35, 37, 36]);

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        let second = Message::decode(requests[1].data.clone()).unwrap();
        let pdu = second.pdu().unwrap();
        assert_eq!(pdu.pdu_type, PduType::GetBulkRequest);
        assert_eq!(pdu.max_repetitions(), Some(2));
        assert_eq!(pdu.varbinds[0].oid, disk_temp(1));
    }

    #[tokio::test(start_paused = true)]
    async fn walk_stops_when_leaving_the_subtree() {
        let mock = mock();
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(disk_temp(0), Value::Integer(35))
                .varbind(oid!(1, 3, 6, 1, 4, 1, 6574, 2, 1, 1, 7, 0), Value::Integer(1))
                .build_v2c(b"public"),
        );
        let mut client = Client::v2c("192.0.2.1").build(mock.clone());
        let results = drain(client.walk(root())).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_increasing_oid_fails_and_stops() {
        let mock = mock();
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(disk_temp(1), Value::Integer(35))
                .varbind(disk_temp(1), Value::Integer(35))
                .varbind(disk_temp(2), Value::Integer(36))
                .build_v2c(b"public"),
        );
        let mut client = Client::v2c("192.0.2.1").build(mock.clone());
        let mut walk = client.walk(root());
        assert!(poll_walk(&mut walk).await.unwrap().is_ok());
        match poll_walk(&mut walk).await {
            Some(Err(Error::NonIncreasingOid { previous, current })) => {
                assert_eq!(previous, disk_temp(1));
                assert_eq!(current, disk_temp(1));
            }
            other => panic!("expected NonIncreasingOid, got {other:?}"),
        }
        assert!(poll_walk(&mut walk).await.is_none());
        assert!(poll_walk(&mut walk).await.is_none());
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn v1_walk_uses_getnext_and_ends_on_no_such_name() {
        let mock = mock();
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(disk_temp(0), Value::Integer(35))
                .build_v1(b"public"),
        );
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(disk_temp(0), Value::Null)
                .error(2, 1)
                .build_v1(b"public"),
        );
        let mut client = Client::v1("192.0.2.1").build(mock.clone());
        let results = drain(client.walk(root())).await.unwrap();
        assert_eq!(results.len(), 1);

        for request in mock.requests() {
            let msg = Message::decode(request.data).unwrap();
            assert_eq!(msg.pdu().unwrap().pdu_type, PduType::GetNextRequest);
        }
        assert_eq!(mock.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_response_ends_walk() {
        let mock = mock();
        mock.queue_response(ResponseBuilder::new(1).build_v2c(b"public"));
        let mut client = Client::v2c("192.0.2.1").build(mock.clone());
        let mut walk = client.walk(root());
        assert!(poll_walk(&mut walk).await.is_none());
        assert_eq!(walk.requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn other_error_status_fails_the_walk() {
        let mock = mock();
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(disk_temp(0), Value::Null)
                .error(5, 1)
                .build_v2c(b"public"),
        );
        let mut client = Client::v2c("192.0.2.1").build(mock.clone());
        let err = drain(client.walk(root())).await.unwrap_err();
        assert!(matches!(err, Error::Snmp { status: ErrorStatus::GenErr, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_mid_walk_is_reported_once() {
        let mock = mock();
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(disk_temp(0), Value::Integer(35))
                .build_v2c(b"public"),
        );
        let mut client = Client::v2c("192.0.2.1").retries(0).build(mock.clone());
        let mut walk = client.walk(root());
        assert!(poll_walk(&mut walk).await.unwrap().is_ok());
        assert!(matches!(poll_walk(&mut walk).await, Some(Err(Error::Timeout { .. }))));
        assert!(poll_walk(&mut walk).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_a_walk_mid_request_releases_the_client() {
        let mock = mock();
        let mut client = Client::v2c("192.0.2.1").retries(0).build(mock.clone());
        {
            let mut walk = client.walk(root());
            let mut cx = Context::from_waker(std::task::Waker::noop());
            // nothing queued: the request is sent and left waiting for a reply
            assert!(Pin::new(&mut walk).poll_next(&mut cx).is_pending());
            assert!(Pin::new(&mut walk).poll_next(&mut cx).is_pending());
            assert_eq!(walk.requests(), 1);
        }
        assert_eq!(mock.request_count(), 1);

        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(disk_temp(0), Value::Integer(35))
                .varbind(disk_temp(1), Value::EndOfMibView)
                .build_v2c(b"public"),
        );
        let rows = client.walk(root()).collect().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(mock.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_are_keyed_by_dotted_oid() {
        let mock = mock();
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(disk_temp(0), Value::OctetString(Bytes::from_static(b"35")))
                .varbind(disk_temp(1), Value::EndOfMibView)
                .build_v2c(b"public"),
        );
        let mut client = Client::v2c("192.0.2.1").build(mock.clone());
        let mut walk = client.walk_entries(".1.3.6.1.4.1.6574.2.1.1.6").unwrap();
        let (key, value) = walk.next_entry().await.unwrap().unwrap();
        assert_eq!(key, "1.3.6.1.4.1.6574.2.1.1.6.0");
        assert_eq!(value.as_f64(), Some(35.0));
        assert!(walk.next_entry().await.is_none());
    }
}
