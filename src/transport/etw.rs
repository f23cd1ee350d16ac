use super::DataTransport;
use crate::constants::{ETW_EVENT_NAME, ETW_PAYLOAD_FIELD, GROUP_ID};
use crate::error::TransportError;
use std::cell::RefCell;
use std::pin::Pin;
use std::sync::Arc;
use tracelogging_dynamic::{EventBuilder, Guid, Level, OutType, Provider};

thread_local! {static EVENT_BUILDER: RefCell<EventBuilder> = RefCell::new(EventBuilder::new());}

/// Writes each payload as one ETW event with a single byte-sequence field.
///
/// On platforms without ETW the provider never reports a listener and every
/// send is a no-op.
pub struct EtwTransport {
    provider: Pin<Arc<Provider>>,
    level: Level,
    keyword: u64,
}

impl EtwTransport {
    /// Registers a provider named `provider_name` in the default group.
    pub fn new(provider_name: &str) -> Self {
        Self::with_group_id(provider_name, &GROUP_ID)
    }

    pub fn with_group_id(provider_name: &str, group_id: &Guid) -> Self {
        let mut options = Provider::options();
        options = *options.group_id(group_id);

        let provider = Arc::pin(Provider::new(provider_name, &options));
        unsafe {
            provider.as_ref().register();
        }
        EtwTransport {
            provider,
            level: Level::Informational,
            keyword: 1,
        }
    }

    pub fn with_keyword(mut self, keyword: u64) -> Self {
        self.keyword = keyword;
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn provider_id(&self) -> &Guid {
        self.provider.id()
    }

    fn write(&self, eb: &mut EventBuilder, payload: &[u8]) -> Result<(), TransportError> {
        eb.reset(ETW_EVENT_NAME, self.level, self.keyword, 0);
        eb.add_u8_sequence(ETW_PAYLOAD_FIELD, payload.iter(), OutType::Unsigned, 0);
        match eb.write(&self.provider.as_ref(), None, None) {
            0 => Ok(()),
            win32err => Err(TransportError::Win32(win32err)),
        }
    }
}

impl std::fmt::Debug for EtwTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtwTransport")
            .field("provider_id", self.provider.id())
            .field("keyword", &self.keyword)
            .finish()
    }
}

impl DataTransport for EtwTransport {
    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        if !self.is_enabled() {
            return Err(TransportError::Disabled);
        }
        EVENT_BUILDER.with(|eb| match eb.try_borrow_mut() {
            Ok(mut eb) => self.write(&mut eb, payload),
            // Re-entered from inside a write on this thread.
            Err(_) => self.write(&mut EventBuilder::new(), payload),
        })
    }

    fn is_enabled(&self) -> bool {
        self.provider.enabled(self.level, self.keyword)
    }
}
