//! The egress collaborator interface (spec section 6.2): per-renderer-
//! connection bookkeeping and the `rdrState` events a renderer's document
//! mutations fan out to every coroutine attached to it. The wire protocol
//! that actually talks to an out-of-process renderer is out of scope (spec
//! section 1) -- a host implements [`crate::scheduler::EgressCollaborator`]
//! against its own transport and uses the types here to shape what it sends.

use std::cell::RefCell;
use std::rc::Rc;

use crate::coroutine::CoroutineToken;
use crate::observer::{Message, ReduceOp};
use crate::runtime::Runtime;

/// Opaque handles a renderer hands back when a page is created (spec
/// section 6.2).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkspaceHandle(pub u64);
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PageHandle(pub u64);
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DomHandle(pub u64);

/// How a page relates to its parent's window/widget (spec section 6.2).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum PageType {
    PlainWin,
    Widget,
    Null,
    Inherit,
    /// Reuses the page the coroutine is itself running under.
    SelfPage,
}

/// One of the four document-mutation events a renderer connection reports
/// as an `rdrState` event (spec section 6.2).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum RdrState {
    PageLoaded,
    PageSuppressed,
    PageReloaded,
    PageClosed,
}

impl RdrState {
    pub fn event_name(self) -> &'static str {
        match self {
            RdrState::PageLoaded => "pageLoaded",
            RdrState::PageSuppressed => "pageSuppressed",
            RdrState::PageReloaded => "pageReloaded",
            RdrState::PageClosed => "pageClosed",
        }
    }
}

/// A coroutine's connection to one renderer-managed page (spec section
/// 6.2's "per-renderer-connection records").
pub struct RendererConnection {
    pub workspace: WorkspaceHandle,
    pub page: PageHandle,
    pub dom: DomHandle,
    pub page_type: PageType,
    pub owner: CoroutineToken,
}

/// Implemented by the host transport that actually talks to a renderer
/// process; this crate only decides *when* to call it and what events its
/// replies become.
pub trait RendererTransport {
    /// Sends a page-creation request for `page_type`, returning the handles
    /// the renderer assigns.
    fn create_page(&self, page_type: PageType) -> (WorkspaceHandle, PageHandle, DomHandle);
}

/// Tracks every coroutine's renderer connections for one runtime instance
/// and turns a transport's pending replies into `rdrState` messages posted
/// to their owning coroutines (spec section 6.2, wired into the scheduler
/// through [`crate::scheduler::EgressCollaborator`]).
pub struct RendererCollaborator<T: RendererTransport> {
    transport: T,
    connections: RefCell<Vec<RendererConnection>>,
    pending: RefCell<Vec<(CoroutineToken, RdrState)>>,
}

impl<T: RendererTransport> RendererCollaborator<T> {
    pub fn new(transport: T) -> Self {
        RendererCollaborator {
            transport,
            connections: RefCell::new(Vec::new()),
            pending: RefCell::new(Vec::new()),
        }
    }

    /// `attach_to_renderer` (spec section 6.2): requests a new page from
    /// the transport and records the returned handles against `owner`.
    pub fn attach_to_renderer(&self, owner: CoroutineToken, page_type: PageType) -> DomHandle {
        let (workspace, page, dom) = self.transport.create_page(page_type);
        self.connections.borrow_mut().push(RendererConnection {
            workspace,
            page,
            dom,
            page_type,
            owner,
        });
        self.pending.borrow_mut().push((owner, RdrState::PageLoaded));
        dom
    }

    /// Queues `state` to be delivered to every coroutine connected to
    /// `dom` the next time `deliver_pending` runs (the "mutations... fire
    /// `rdrState` events that scheduler fans out to every coroutine
    /// attached to that document" rule of spec section 5).
    pub fn notify(&self, dom: DomHandle, state: RdrState) {
        let owners: Vec<CoroutineToken> = self
            .connections
            .borrow()
            .iter()
            .filter(|c| c.dom == dom)
            .map(|c| c.owner)
            .collect();
        self.pending
            .borrow_mut()
            .extend(owners.into_iter().map(|owner| (owner, state)));
    }

    pub fn connections_for(&self, owner: CoroutineToken) -> Vec<DomHandle> {
        self.connections
            .borrow()
            .iter()
            .filter(|c| c.owner == owner)
            .map(|c| c.dom)
            .collect()
    }
}

impl<T: RendererTransport> crate::scheduler::EgressCollaborator for RendererCollaborator<T> {
    fn deliver_pending(&self, runtime: &Runtime) {
        for (owner, state) in self.pending.borrow_mut().drain(..) {
            if let Some(co) = runtime.coroutines.get(owner) {
                co.queue.borrow_mut().push(Message {
                    event_type: "rdrState".to_string(),
                    sub_type: state.event_name().to_string(),
                    source_uri: String::new(),
                    element_value: String::new(),
                    event_name: state.event_name().to_string(),
                    data: vec![],
                    request_id: String::new(),
                    reduce_op: ReduceOp::None,
                    target: Some(owner),
                });
                co.set_state(crate::coroutine::RunState::Ready);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vdom::Document;

    struct FakeTransport {
        next: std::cell::Cell<u64>,
    }

    impl RendererTransport for FakeTransport {
        fn create_page(&self, _page_type: PageType) -> (WorkspaceHandle, PageHandle, DomHandle) {
            let n = self.next.get();
            self.next.set(n + 1);
            (WorkspaceHandle(n), PageHandle(n), DomHandle(n))
        }
    }

    #[test]
    fn attach_records_connection_and_queues_page_loaded() {
        let rt = Runtime::new();
        let co = rt.spawn(Document::new(), None);
        let collaborator = RendererCollaborator::new(FakeTransport { next: std::cell::Cell::new(0) });

        let dom = collaborator.attach_to_renderer(co.token, PageType::PlainWin);
        assert_eq!(collaborator.connections_for(co.token), vec![dom]);

        use crate::scheduler::EgressCollaborator;
        collaborator.deliver_pending(&rt);
        assert_eq!(co.queue.borrow().len(), 1);
    }

    #[test]
    fn notify_fans_out_to_every_coroutine_attached_to_the_dom() {
        let rt = Runtime::new();
        let co_a = rt.spawn(Document::new(), None);
        let co_b = rt.spawn(Document::new(), None);
        let collaborator = RendererCollaborator::new(FakeTransport { next: std::cell::Cell::new(0) });

        let dom = collaborator.attach_to_renderer(co_a.token, PageType::Widget);
        collaborator.connections.borrow_mut().push(RendererConnection {
            workspace: WorkspaceHandle(99),
            page: PageHandle(99),
            dom,
            page_type: PageType::Widget,
            owner: co_b.token,
        });
        collaborator.pending.borrow_mut().clear();

        collaborator.notify(dom, RdrState::PageClosed);
        use crate::scheduler::EgressCollaborator;
        collaborator.deliver_pending(&rt);
        assert_eq!(co_a.queue.borrow().len(), 1);
        assert_eq!(co_b.queue.borrow().len(), 1);
        assert_eq!(
            co_a.queue.borrow_mut().pull_one().unwrap().sub_type,
            "pageClosed"
        );
    }
}
