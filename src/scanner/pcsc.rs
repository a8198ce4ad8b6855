//! PC/SC backend for ACR122U and compatible contactless readers.
//!
//! Each poll waits (bounded) for a card to enter the field, connects in
//! shared mode, sends the GET-UID pseudo-APDU and disconnects again, leaving
//! the card untouched for other applications.

use super::{
    GET_UID_APDU, POLL_CHANNEL_BUFFER_SIZE, PollResult, PollSettings, ReadError, ReaderFault,
    ScanError, SharingViolationMonitor, TagReader, classify_fault, decode_uid_response,
    run_poll_loop, select_reader,
};
use crate::tag_uid::TagUid;
use pcsc::{
    Context, Disposition, MAX_BUFFER_SIZE, Protocols, ReaderState, Scope, ShareMode, State,
};
use std::ffi::CString;
use std::time::Duration;
use tokio::sync::mpsc;

impl From<pcsc::Error> for ReaderFault {
    fn from(err: pcsc::Error) -> Self {
        match err {
            pcsc::Error::Timeout => ReaderFault::Timeout,
            pcsc::Error::NoSmartcard
            | pcsc::Error::RemovedCard
            | pcsc::Error::UnresponsiveCard
            | pcsc::Error::UnpoweredCard
            | pcsc::Error::ResetCard => ReaderFault::NoCard,
            pcsc::Error::SharingViolation => ReaderFault::SharingViolation,
            other => ReaderFault::Other(other.to_string()),
        }
    }
}

/// Errors after which the context, or the reader it refers to, is gone for
/// good: pcscd restarted, the service stopped with the last reader unplugged,
/// or the reader itself disappeared.
fn requires_new_context(err: pcsc::Error) -> bool {
    matches!(
        err,
        pcsc::Error::NoService
            | pcsc::Error::ServiceStopped
            | pcsc::Error::InvalidHandle
            | pcsc::Error::UnknownReader
            | pcsc::Error::ReaderUnavailable
            | pcsc::Error::NoReadersAvailable
    )
}

/// An established context together with the reader selected through it.
struct Session {
    context: Context,
    reader: CString,
}

impl Session {
    /// Establish a context and select a reader. Returns the reader's name too.
    fn establish() -> Result<(Self, String), ScanError> {
        let context = Context::establish(Scope::User)
            .map_err(|e| ScanError::Reader(format!("failed to establish context: {e}")))?;

        let mut readers = list_readers(&context)?;
        let names: Vec<String> = readers
            .iter()
            .map(|reader| reader.to_string_lossy().into_owned())
            .collect();

        let selection = select_reader(&names)?;

        tracing::info!(count = names.len(), "available readers");
        for (i, name) in names.iter().enumerate() {
            tracing::info!(index = i + 1, reader = %name);
        }

        let reader = readers.swap_remove(selection.index);
        Ok((Self { context, reader }, selection.name))
    }

    fn wait_for_card(&self, timeout: Duration) -> Result<bool, pcsc::Error> {
        let mut states = [ReaderState::new(self.reader.clone(), State::UNAWARE)];

        // UNAWARE returns the current state immediately
        self.context.get_status_change(Duration::ZERO, &mut states)?;
        if !states[0].event_state().contains(State::PRESENT) {
            states[0].sync_current_state();
            self.context.get_status_change(timeout, &mut states)?;
        }

        Ok(states[0].event_state().contains(State::PRESENT))
    }

    fn read_uid(&self, timeout: Duration) -> Result<Option<TagUid>, pcsc::Error> {
        if !self.wait_for_card(timeout)? {
            return Ok(None);
        }

        let card = self
            .context
            .connect(&self.reader, ShareMode::Shared, Protocols::ANY)?;

        let mut buffer = [0u8; MAX_BUFFER_SIZE];
        let uid = decode_uid_response(card.transmit(&GET_UID_APDU, &mut buffer)?);

        if let Err((_, err)) = card.disconnect(Disposition::LeaveCard) {
            tracing::debug!(%err, "disconnecting from card failed");
        }

        if let Some(uid) = &uid {
            tracing::debug!(uid = %uid, family = %uid.family(), "read tag UID");
        }
        Ok(uid)
    }
}

/// The selected reader, exclusively owned by the poll loop.
///
/// When the smart card service goes away the context is dropped, and every
/// following poll tries to establish a new one until that succeeds.
pub struct ReaderHandle {
    session: Option<Session>,
    name: String,
    card_timeout: Duration,
    sharing_violations: SharingViolationMonitor,
}

impl ReaderHandle {
    /// Establish a PC/SC context and select a reader.
    ///
    /// Blocking; fails with [`ScanError::NoReader`] when no reader is attached.
    pub fn open(card_timeout: Duration) -> Result<Self, ScanError> {
        let (session, name) = Session::establish()?;

        Ok(Self {
            session: Some(session),
            name,
            card_timeout,
            sharing_violations: SharingViolationMonitor::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn reconnect(&mut self) -> Result<(), ReadError> {
        match Session::establish() {
            Ok((session, name)) => {
                tracing::info!(reader = %name, "reconnected to the smart card service");
                self.session = Some(session);
                self.name = name;
                Ok(())
            }
            Err(err) => {
                tracing::debug!(%err, "reconnecting to the smart card service failed");
                Err(ReadError::Unavailable(err.to_string()))
            }
        }
    }
}

impl TagReader for ReaderHandle {
    fn poll_once(&mut self) -> PollResult {
        if self.session.is_none() {
            self.reconnect()?;
        }
        let Some(session) = &self.session else {
            return Ok(None);
        };

        match session.read_uid(self.card_timeout) {
            Ok(uid) => {
                self.sharing_violations.reset();
                Ok(uid)
            }
            Err(err) if requires_new_context(err) => {
                tracing::warn!(
                    reader = %self.name,
                    %err,
                    "lost the smart card service, reconnecting on the next polls"
                );
                self.session = None;
                self.sharing_violations.reset();
                Err(ReadError::Unavailable(err.to_string()))
            }
            Err(err) => classify_fault(ReaderFault::from(err), &mut self.sharing_violations),
        }
    }
}

fn list_readers(context: &Context) -> Result<Vec<CString>, ScanError> {
    match context.list_readers_owned() {
        Ok(readers) => Ok(readers),
        Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
        Err(err) => Err(ScanError::Reader(format!("failed to list readers: {err}"))),
    }
}

/// Open the reader and start polling it on a blocking thread.
pub async fn start_scan(settings: PollSettings) -> Result<mpsc::Receiver<PollResult>, ScanError> {
    let mut handle = tokio::task::spawn_blocking(move || ReaderHandle::open(settings.card_timeout))
        .await
        .map_err(|e| ScanError::Reader(format!("reader setup task failed: {e}")))??;

    tracing::info!(reader = handle.name(), "ready to scan, hold a tag to the reader");

    let (tx, rx) = mpsc::channel(POLL_CHANNEL_BUFFER_SIZE);
    tokio::task::spawn_blocking(move || run_poll_loop(&mut handle, tx, settings.interval));

    Ok(rx)
}
