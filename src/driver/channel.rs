/* Firmware channel: the single request/response primitive in front of the WMI block. One mutex
 * guards each whole transaction so a read's select and fetch steps are never interleaved. */
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::driver::excalibur::{
    self, FirmwareCommand, FirmwareResponse, ProtocolError, encode_read, encode_write,
};
use crate::driver::{TransportError, WmiTransport};

/* WMI block instance used by the controller. */
pub const DEFAULT_INSTANCE: u8 = 0;

/* Failures of one exchange. Never retried at this layer. */
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Failed to submit command {sub:#06x}: {source}")]
    SubmitFailed {
        sub: u16,
        #[source]
        source: TransportError,
    },

    #[error("Failed to query WMI block after selecting {sub:#06x}: {source}")]
    QueryFailed {
        sub: u16,
        #[source]
        source: TransportError,
    },

    #[error("Malformed response to {sub:#06x}: {source}")]
    Malformed {
        sub: u16,
        #[source]
        source: ProtocolError,
    },
}

/* Owns the transport and serializes every exchange through it.     */
/*                                                                  */
/* The controller is one global register window: a READ selector    */
/* picks the value the next block query will expose. Holding the     */
/* lock across both steps keeps another caller's write from landing  */
/* between them.                                                     */
pub struct FirmwareChannel {
    transport: Mutex<Box<dyn WmiTransport>>,
    instance: u8,
}

impl FirmwareChannel {
    pub fn new(transport: Box<dyn WmiTransport>) -> Self {
        Self {
            transport: Mutex::new(transport),
            instance: DEFAULT_INSTANCE,
        }
    }

    /* Address a different WMI block instance. */
    pub fn with_instance(mut self, instance: u8) -> Self {
        self.instance = instance;
        self
    }

    /* Name of the backing transport. */
    pub fn transport_name(&self) -> String {
        self.transport.lock().name().to_string()
    }

    /* Run one transaction.                                         */
    /*                                                              */
    /* WRITE commands are submitted and yield `None`; the firmware  */
    /* does not reply meaningfully to them. READ commands submit    */
    /* the selector, then fetch and decode the block.               */
    pub fn exchange(
        &self,
        cmd: &FirmwareCommand,
    ) -> Result<Option<FirmwareResponse>, ChannelError> {
        let sub = cmd.sub;
        let transport = self.transport.lock();

        let bytes = cmd.to_bytes();
        debug!("TX {} bytes: {:02x?}", bytes.len(), bytes);
        transport
            .set_block(self.instance, &bytes)
            .map_err(|source| ChannelError::SubmitFailed { sub, source })?;

        if !cmd.is_read() {
            return Ok(None);
        }

        let payload = transport
            .query_block(self.instance)
            .and_then(|obj| obj.ok_or(TransportError::NoData))
            .map_err(|source| ChannelError::QueryFailed { sub, source })?;

        let response = excalibur::decode(&payload)
            .map_err(|source| ChannelError::Malformed { sub, source })?;
        debug!("RX {sub:#06x}: {response:x?}");
        Ok(Some(response))
    }

    /* Submit WRITE(sub, reg0, reg1). */
    pub fn write(&self, sub: u16, reg0: u32, reg1: u32) -> Result<(), ChannelError> {
        self.exchange(&encode_write(sub, reg0, reg1)).map(|_| ())
    }

    /* Select `sub` and fetch the populated block. */
    pub fn read(&self, sub: u16) -> Result<FirmwareResponse, ChannelError> {
        self.exchange(&encode_read(sub))?
            .ok_or(ChannelError::QueryFailed {
                sub,
                source: TransportError::NoData,
            })
    }
}
