//! Recording stand-in for a drm device

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::os::unix::io::{AsRawFd, BorrowedFd, RawFd};
use std::rc::Rc;

use drm::buffer;
use drm::control::{framebuffer, from_u32};

use super::device::{FramebufferRequest, KmsDevice};

pub(crate) const EINVAL: i32 = 22;

#[derive(Debug, Default)]
struct State {
    fail_import: bool,
    fail_framebuffer: bool,
    imports: usize,
    next_handle: u32,
    open: HashMap<RawFd, buffer::Handle>,
    requests: Vec<FramebufferRequest>,
    destroyed: Vec<framebuffer::Handle>,
    closed: Vec<buffer::Handle>,
}

/// Hands out increasing handles and remembers every call
///
/// Like the kernel, importing a dmabuf that already has an open gem handle returns
/// that handle again.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockDevice {
    state: Rc<RefCell<State>>,
}

impl MockDevice {
    pub fn fail_import(&self, fail: bool) {
        self.state.borrow_mut().fail_import = fail;
    }

    pub fn fail_framebuffer(&self, fail: bool) {
        self.state.borrow_mut().fail_framebuffer = fail;
    }

    pub fn imports(&self) -> usize {
        self.state.borrow().imports
    }

    pub fn open_handles(&self) -> usize {
        self.state.borrow().open.len()
    }

    pub fn framebuffer_requests(&self) -> Vec<FramebufferRequest> {
        self.state.borrow().requests.clone()
    }

    pub fn destroyed(&self) -> Vec<framebuffer::Handle> {
        self.state.borrow().destroyed.clone()
    }

    pub fn closed(&self) -> Vec<buffer::Handle> {
        self.state.borrow().closed.clone()
    }
}

impl KmsDevice for MockDevice {
    fn import_prime_fd(&self, fd: BorrowedFd<'_>) -> io::Result<buffer::Handle> {
        let mut state = self.state.borrow_mut();
        if state.fail_import {
            return Err(io::Error::from_raw_os_error(EINVAL));
        }
        state.imports += 1;
        if let Some(handle) = state.open.get(&fd.as_raw_fd()) {
            return Ok(*handle);
        }

        state.next_handle += 1;
        let handle: buffer::Handle =
            from_u32(state.next_handle).ok_or_else(|| io::Error::from_raw_os_error(EINVAL))?;
        state.open.insert(fd.as_raw_fd(), handle);
        Ok(handle)
    }

    fn add_planar_framebuffer(&self, request: &FramebufferRequest) -> io::Result<framebuffer::Handle> {
        let mut state = self.state.borrow_mut();
        if state.fail_framebuffer {
            return Err(io::Error::from_raw_os_error(EINVAL));
        }
        state.requests.push(*request);
        from_u32(100 + state.requests.len() as u32).ok_or_else(|| io::Error::from_raw_os_error(EINVAL))
    }

    fn destroy_framebuffer(&self, fb: framebuffer::Handle) -> io::Result<()> {
        self.state.borrow_mut().destroyed.push(fb);
        Ok(())
    }

    fn close_buffer(&self, handle: buffer::Handle) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        let before = state.open.len();
        state.open.retain(|_, open| *open != handle);
        if state.open.len() == before {
            return Err(io::Error::from_raw_os_error(EINVAL));
        }
        state.closed.push(handle);
        Ok(())
    }
}
