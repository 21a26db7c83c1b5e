/// Test doubles simulating a shared CAN bus and a controllable clock
/// for end-to-end conversations between one broker and many clients.
use can_pubsub::protocol::transport::can_frame::CanFrame;
use can_pubsub::protocol::transport::traits::can_bus::CanBus;
use can_pubsub::protocol::transport::traits::clock::Clock;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

type Queue = Rc<RefCell<VecDeque<CanFrame>>>;

/// In-memory broadcast bus: every frame an endpoint sends lands in the
/// receive queue of every *other* endpoint, like a real CAN segment.
#[derive(Default, Clone)]
pub struct SharedBus {
    queues: Rc<RefCell<Vec<Queue>>>,
}

#[allow(dead_code)]
impl SharedBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach one more node to the segment.
    pub fn endpoint(&self) -> BusEndpoint {
        let queue: Queue = Rc::default();
        let mut queues = self.queues.borrow_mut();
        queues.push(queue.clone());
        BusEndpoint {
            index: queues.len() - 1,
            queue,
            queues: self.queues.clone(),
        }
    }
}

pub struct BusEndpoint {
    index: usize,
    queue: Queue,
    queues: Rc<RefCell<Vec<Queue>>>,
}

impl CanBus for BusEndpoint {
    type Error = std::convert::Infallible;

    fn send(&mut self, frame: &CanFrame) -> Result<(), Self::Error> {
        for (index, queue) in self.queues.borrow().iter().enumerate() {
            if index != self.index {
                queue.borrow_mut().push_back(*frame);
            }
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<CanFrame>, Self::Error> {
        Ok(self.queue.borrow_mut().pop_front())
    }
}

/// Manually advanced clock shared by every node; `delay_ms` moves the
/// whole test world forward.
#[derive(Default, Clone)]
pub struct TestClock {
    now: Rc<Cell<u64>>,
}

#[allow(dead_code)]
impl TestClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for TestClock {
    fn now_ms(&mut self) -> u64 {
        self.now.get()
    }

    fn delay_ms(&mut self, millis: u32) {
        self.advance(u64::from(millis));
    }
}
