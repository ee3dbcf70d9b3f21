//! Testes de fila e marcador

use super::{TestCase, TestResult};
use crate::mm::page::{PageId, PageQueueKind};
use crate::mm::reclaim::cursor::QueueScan;
use crate::mm::reclaim::queue::{Marker, PageQueue, Slot};

pub const QUEUE_TESTS: &[TestCase] = &[
    TestCase::new("queue_fifo_order", test_fifo_order),
    TestCase::new("queue_marker_survives_removal", test_marker_survives_removal),
    TestCase::new("queue_two_scans_interleave", test_two_scans_interleave),
];

fn filled(n: u32) -> PageQueue {
    let queue = PageQueue::new(PageQueueKind::Inactive);
    {
        let mut q = queue.lock();
        for i in 0..n {
            q.push_tail(Slot::Page(PageId(i)));
        }
    }
    queue
}

fn test_fifo_order() -> TestResult {
    let queue = filled(3);
    let mut q = queue.lock();
    if q.pop_page() != Some(PageId(0)) || q.pop_page() != Some(PageId(1)) {
        return TestResult::Failed;
    }
    if q.len() != 1 {
        return TestResult::Failed;
    }
    TestResult::Passed
}

fn test_marker_survives_removal() -> TestResult {
    let queue = filled(3);
    let mut scan = QueueScan::begin(&queue, Marker::new(0), usize::MAX);
    if scan.next() != Some(Slot::Page(PageId(0))) {
        return TestResult::Failed;
    }
    // A página visitada sai da fila enquanto o lock está solto.
    queue.lock().remove(Slot::Page(PageId(0)));
    if scan.still_after(PageId(0)) {
        return TestResult::Failed;
    }
    if scan.next() != Some(Slot::Page(PageId(1))) {
        return TestResult::Failed;
    }
    drop(scan);
    if queue.lock().contains(Slot::Marker(0)) {
        return TestResult::Failed;
    }
    TestResult::Passed
}

fn test_two_scans_interleave() -> TestResult {
    let queue = filled(2);
    let mut a = QueueScan::begin(&queue, Marker::new(1), usize::MAX);
    let mut b = QueueScan::begin(&queue, Marker::new(2), usize::MAX);
    let mut pages = 0;
    for _ in 0..4 {
        if let Some(Slot::Page(_)) = a.next() {
            pages += 1;
        }
        if let Some(Slot::Page(_)) = b.next() {
            pages += 1;
        }
    }
    if pages != 4 {
        return TestResult::Failed;
    }
    TestResult::Passed
}
