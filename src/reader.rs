//! Stateful message walker
//!
//! Iterating a [`MessageReader`] yields every definition and data message in
//! file order.  The reader owns the definition slot table: a sixteen-entry
//! array indexed by local message type.  Installing a definition under one
//! slot never disturbs the bindings of the others, so files that interleave
//! several concurrently-defined message types decode correctly.

use std::sync::Arc;

use tracing::debug;

use crate::DecoderError;
use crate::header::FileHeader;
use crate::message::{DataMessage, DefinitionMessage, RecordHeader, RecordKind};
use crate::stream::ByteStream;

const NUM_SLOTS: usize = 16;

/// A message emitted by [`MessageReader`], in file order.
#[derive(Clone, Debug)]
pub enum FitMessage {
    Definition(Arc<DefinitionMessage>),
    Data(DataMessage),
}

/// Iterator over the message records of a FIT file.
///
/// Yields `Err` once and then fuses if the record stream is malformed.
pub struct MessageReader<'a> {
    stream: ByteStream<'a>,
    header: FileHeader,
    definitions: [Option<Arc<DefinitionMessage>>; NUM_SLOTS],
    data_end: usize,
    finished: bool,
}

impl<'a> MessageReader<'a> {
    /// Creates a reader from a stream positioned at the first message
    /// record, i.e. just past the file header.
    pub(crate) fn new(stream: ByteStream<'a>, header: FileHeader) -> Self {
        Self {
            stream,
            header,
            definitions: Default::default(),
            data_end: header.data_end(),
            finished: false,
        }
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// The definition currently bound to a local message type slot.
    pub fn definition(&self, local_type: u8) -> Option<&Arc<DefinitionMessage>> {
        self.definitions.get(local_type as usize)?.as_ref()
    }

    /// Current byte offset into the underlying file.
    pub fn position(&self) -> usize {
        self.stream.position()
    }

    fn next_message(&mut self) -> Result<Option<FitMessage>, DecoderError> {
        if self.stream.position() >= self.data_end {
            return Ok(None);
        }

        let position = self.stream.position();
        let header = RecordHeader::new(self.stream.peek_byte()?);

        match header.kind() {
            RecordKind::CompressedTimestamp => {
                Err(DecoderError::CompressedTimestamp { position })
            }

            RecordKind::Definition { .. } => {
                let definition = Arc::new(DefinitionMessage::read(&mut self.stream)?);
                debug!(
                    local_type = definition.local_type,
                    global_mesg_num = definition.global_mesg_num,
                    num_fields = definition.fields.len(),
                    "Installed definition"
                );
                self.definitions[definition.local_type as usize] = Some(Arc::clone(&definition));
                Ok(Some(FitMessage::Definition(definition)))
            }

            RecordKind::Data => {
                let local = header.local_type();
                let definition = self.definitions[local as usize].clone().ok_or(
                    DecoderError::DataBeforeDefinition {
                        local,
                        position,
                    },
                )?;
                let message = DataMessage::read(&mut self.stream, definition)?;
                Ok(Some(FitMessage::Data(message)))
            }
        }
    }
}

impl Iterator for MessageReader<'_> {
    type Item = Result<FitMessage, DecoderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_message() {
            Ok(Some(message)) => Some(Ok(message)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}
