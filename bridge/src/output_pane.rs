//! Output pane companion window

use hmbridge_host::messages::OUTPUT_PANE_CLEAR;
use hmbridge_host::WindowHandle;

use crate::error::{BridgeError, Result};
use crate::host_call::send_command;
use crate::symbols::{GET_CURRENT_WINDOW_HANDLE, OUTPUT_PANE_WINDOW};
use crate::Hm;

/// The output pane attached to the current editor window.
pub struct OutputPane<'a> {
    hm: &'a Hm,
}

impl<'a> OutputPane<'a> {
    pub fn new(hm: &'a Hm) -> Self {
        Self { hm }
    }

    fn host_window(&self) -> Result<WindowHandle> {
        self.hm
            .window_handle()
            .ok_or(BridgeError::HostUnavailable(GET_CURRENT_WINDOW_HANDLE.symbol))
    }

    /// Window of the pane. Unavailable when the companion module is missing
    /// or no pane exists for this editor window.
    pub fn window_handle(&self) -> Result<WindowHandle> {
        let hwnd = self.host_window()?;
        let pane = self.hm.host().output_pane_window(hwnd)?;
        if pane.is_null() {
            return Err(BridgeError::HostUnavailable(OUTPUT_PANE_WINDOW.symbol));
        }
        Ok(pane)
    }

    /// Send a numeric command to the pane.
    pub fn send_command(&self, command_id: i32) -> Result<i32> {
        let pane = self.window_handle()?;
        log::debug!("output pane command {}", command_id);
        Ok(send_command(self.hm, pane, command_id))
    }

    pub fn clear(&self) -> Result<i32> {
        self.send_command(OUTPUT_PANE_CLEAR)
    }

    /// Save the pane's contents and settings; [`pop`](Self::pop) restores them.
    pub fn push(&self) -> Result<i32> {
        let hwnd = self.host_window()?;
        Ok(self.hm.host().output_pane_push(hwnd)?)
    }

    pub fn pop(&self) -> Result<i32> {
        let hwnd = self.host_window()?;
        Ok(self.hm.host().output_pane_pop(hwnd)?)
    }
}
