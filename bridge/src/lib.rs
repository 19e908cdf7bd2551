//! Hidemaru macro bridge
//!
//! Lets an extension loaded inside the Hidemaru editor query the editor and
//! run macro code, and lets macro code hand values back to the extension.
//!
//! # Architecture
//!
//! - **Symbol Resolver** (`symbols`): binds the host's exports by name, once,
//!   gated on the host version
//! - **Host Call Surface** (`host_call`): thin wrappers over the exports and the
//!   message RPC
//! - **Execution-State Guard** (`guard`): decides which invocation mode is
//!   legal from whether a macro is running
//! - **Variable Bridge** (`var`): typed get/set of macro variables through the
//!   process-wide exchange slot (`exchange`)
//! - **Statement/Function Invoker** (`invoke`): builds macro expressions from
//!   a name and arguments and runs them
//!
//! Every entry point is synchronous and blocks for one or more message
//! round-trips. The exchange slot is shared by the whole process, so callers
//! that use the bridge from several threads must serialize whole
//! [`Vars`] and [`Macro`] calls themselves.
//!
//! # Usage
//!
//! ```rust,ignore
//! let hm = hmbridge::Hm::global();
//! let text = hm.edit().total_text()?;
//! hm.vars().set("#count", 3)?;
//! let r = hm.macros().statement("insert", &["hello".into()]);
//! ```

use std::sync::{Arc, OnceLock};

use hmbridge_host::{Host, HostVersion, WindowHandle};

pub mod config;
pub mod encoding;
pub mod error;
pub mod exchange;
pub mod ffi;
pub mod guard;
pub mod host_call;
pub mod invoke;
pub mod logging;
pub mod native;
pub mod output_pane;
pub mod symbols;
pub mod value;
pub mod var;

pub use config::BridgeConfig;
pub use error::{BridgeError, FunctionResult, MacroResult, Result};
pub use exchange::{AccessorLocator, ExchangeAccessor, ExchangeSlot};
pub use guard::{ExecState, ExecutionGuard};
pub use host_call::{Edit, File, MousePos};
pub use invoke::{Invoker, Macro};
pub use output_pane::OutputPane;
pub use value::{coerce, MacroValue, Namespace, Value};
pub use var::Vars;

pub use hmbridge_host as host;

/// Entry point to one host process.
pub struct Hm {
    host: Arc<dyn Host>,
    accessor: AccessorLocator,
    invoker: Invoker,
}

static GLOBAL: OnceLock<Hm> = OnceLock::new();

impl Hm {
    /// Bridge over an already bound host.
    pub fn new(host: Arc<dyn Host>, config: &BridgeConfig) -> Self {
        Self::with_invoker(host, config, Invoker::new())
    }

    /// Bridge with an explicit exchange-variable naming family.
    pub fn with_invoker(host: Arc<dyn Host>, config: &BridgeConfig, invoker: Invoker) -> Self {
        let default_assembly = config
            .accessor
            .assembly_path
            .clone()
            .or_else(native::own_module_path)
            .unwrap_or_else(|| "hmbridge.dll".into());

        Self {
            host,
            accessor: AccessorLocator::new(default_assembly, &config.accessor),
            invoker,
        }
    }

    /// The bridge of the current process, bound to the native host on first use.
    ///
    /// Binding never fails: exports that cannot be resolved stay unbound and
    /// the calls that need them report [`BridgeError::HostUnavailable`].
    pub fn global() -> &'static Hm {
        GLOBAL.get_or_init(|| {
            let config = BridgeConfig::from_env();
            logging::init_with_config(&config.log);
            let host = native::NativeHost::global(&config);
            Hm::new(host, &config)
        })
    }

    pub fn host(&self) -> &dyn Host {
        &*self.host
    }

    pub fn accessor(&self) -> &AccessorLocator {
        &self.accessor
    }

    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    pub fn version(&self) -> HostVersion {
        self.host.version()
    }

    /// Main window of the current editor, `None` when unavailable.
    pub fn window_handle(&self) -> Option<WindowHandle> {
        match self.host.current_window_handle() {
            Ok(h) if !h.is_null() => Some(h),
            Ok(_) => None,
            Err(e) => {
                log::debug!("{}", e);
                None
            }
        }
    }

    /// Whether the host has pending input in its message queue.
    pub fn check_queue_status(&self) -> Result<bool> {
        Ok(self.host.check_queue_status()? != 0)
    }

    pub fn guard(&self) -> ExecutionGuard<'_> {
        ExecutionGuard::new(self)
    }

    pub fn edit(&self) -> Edit<'_> {
        Edit::new(self)
    }

    pub fn file(&self) -> File<'_> {
        File::new(self)
    }

    pub fn macros(&self) -> Macro<'_> {
        Macro::new(self)
    }

    pub fn vars(&self) -> Vars<'_> {
        Vars::new(self)
    }

    pub fn output_pane(&self) -> OutputPane<'_> {
        OutputPane::new(self)
    }
}
