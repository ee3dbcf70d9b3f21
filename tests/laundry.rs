//! Lavagem: status do pager, vnode ocupado e o laundry worker.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use pageout::hosted::MemStore;
use pageout::mm::config::{PagingTargets, Tunables};
use pageout::mm::error::ReclaimError;
use pageout::mm::page::PageQueueKind;
use pageout::mm::reclaim::LaundryWorker;
use pageout::mm::{PageFlags, Pager, PagerStatus, Vnode};

#[test]
fn busy_vnode_is_skipped_and_syncer_woken() {
    let t = common::build(1, 16, 16);
    t.vm.set_tunable("vm.vnode_lock_timeout_ms", "5").unwrap();
    let store = Arc::new(MemStore::new());
    let vnode = Arc::new(Vnode::new("dados.db"));
    let object = t.vm.object_create(
        Pager::Vnode {
            store: store.clone(),
            vnode: vnode.clone(),
        },
        4,
    );
    let pages = t.dirty_in_laundry(object, [0]);

    {
        let _writer = vnode.lock();
        assert_eq!(t.vm.launder(0, 1, true), 0);
    }
    assert_eq!(store.call_count(), 0);
    assert_eq!(t.vm.stats().lock_misses, 1);
    assert_eq!(t.env.syncer.speedups(), 1);
    assert_eq!(t.vm.page_snapshot(pages[0]).unwrap().queue, PageQueueKind::Laundry);

    assert_eq!(t.vm.launder(0, 1, true), 1);
    assert_eq!(store.call_count(), 1);
    assert!(!vnode.is_locked());
    t.assert_consistent();
}

#[test]
fn page_changed_while_waiting_for_vnode_is_left_alone() {
    let t = common::build(1, 16, 16);
    t.vm.set_tunable("vm.vnode_lock_timeout_ms", "5000").unwrap();
    let store = Arc::new(MemStore::new());
    let vnode = Arc::new(Vnode::new("log.txt"));
    let object = t.vm.object_create(
        Pager::Vnode {
            store: store.clone(),
            vnode: vnode.clone(),
        },
        4,
    );
    let page = t.dirty_in_laundry(object, [0])[0];

    let writer = vnode.lock();
    let vm = Arc::clone(&t.vm);
    let launderer = std::thread::spawn(move || vm.launder(0, 1, true));

    // Espera o launder chegar na página e parar no lock do vnode.
    let deadline = Instant::now() + Duration::from_secs(5);
    while t.vm.stats().scanned == 0 {
        assert!(Instant::now() < deadline, "launder não chegou na página");
        std::thread::sleep(Duration::from_millis(1));
    }
    std::thread::sleep(Duration::from_millis(20));

    // Truncate no meio: a página sai da laundry limpa.
    t.vm.page_invalidate(page).unwrap();
    drop(writer);

    assert_eq!(launderer.join().unwrap(), 0);
    assert_eq!(store.call_count(), 0);
    assert!(t.vm.stats().identity_changes >= 1);
    assert_eq!(t.vm.stats().lock_misses, 0);
    let snap = t.vm.page_snapshot(page).unwrap();
    assert_eq!(snap.queue, PageQueueKind::Inactive);
    assert!(!snap.flags.contains(PageFlags::DIRTY));
    assert_eq!(snap.busy, 0);
    assert!(!vnode.is_locked());
    t.assert_consistent();
}

#[test]
fn pending_write_stays_busy_until_done() {
    let t = common::build(1, 16, 16);
    let store = Arc::new(MemStore::with_status(PagerStatus::Pending));
    let object = t.swap_object(&store, 4);
    let page = t.dirty_in_laundry(object, [0])[0];

    assert_eq!(t.vm.launder(0, 1, true), 1);
    let snap = t.vm.page_snapshot(page).unwrap();
    assert_eq!(snap.busy, 1);
    assert_eq!(snap.queue, PageQueueKind::Laundry);
    assert_eq!(t.vm.object(object).unwrap().lock().pip, 1);
    assert_eq!(t.vm.page_free(page), Err(ReclaimError::ResourceBusy));

    // Nova passada não escreve a página de novo.
    assert_eq!(t.vm.launder(0, 1, true), 0);
    assert_eq!(store.call_count(), 1);

    t.vm.pageout_done(page, true).unwrap();
    let snap = t.vm.page_snapshot(page).unwrap();
    assert_eq!(snap.busy, 0);
    assert_eq!(snap.queue, PageQueueKind::Inactive);
    assert!(!snap.flags.contains(PageFlags::DIRTY));
    assert_eq!(t.vm.object(object).unwrap().lock().pip, 0);
    assert_eq!(
        t.vm.pageout_done(page, true),
        Err(ReclaimError::IdentityChanged)
    );
    t.assert_consistent();
}

#[test]
fn failed_async_write_reactivates_dirty() {
    let t = common::build(1, 16, 16);
    let store = Arc::new(MemStore::with_status(PagerStatus::Pending));
    let object = t.swap_object(&store, 4);
    let page = t.dirty_in_laundry(object, [0])[0];

    t.vm.launder(0, 1, true);
    t.vm.pageout_done(page, false).unwrap();

    let snap = t.vm.page_snapshot(page).unwrap();
    assert_eq!(snap.queue, PageQueueKind::Active);
    assert!(snap.flags.contains(PageFlags::DIRTY));
    assert_eq!(t.vm.stats().write_errors, 1);
}

#[test]
fn terminate_waits_for_pending_io() {
    let t = common::build(1, 16, 16);
    let store = Arc::new(MemStore::with_status(PagerStatus::Pending));
    let object = t.swap_object(&store, 4);
    let page = t.dirty_in_laundry(object, [0])[0];
    t.vm.launder(0, 1, true);

    let vm = Arc::clone(&t.vm);
    let terminator = std::thread::spawn(move || vm.object_terminate(object));
    std::thread::sleep(std::time::Duration::from_millis(30));
    assert!(!terminator.is_finished());

    t.vm.pageout_done(page, true).unwrap();
    assert_eq!(terminator.join().unwrap(), Ok(1));
    assert_eq!(t.vm.free_count(), 16);
    t.assert_consistent();
}

#[test]
fn transient_error_with_swap_reactivates() {
    let t = common::build(1, 16, 16);
    t.vm.swap_attach();
    let store = Arc::new(MemStore::with_status(PagerStatus::Error));
    let object = t.swap_object(&store, 4);
    let page = t.dirty_in_laundry(object, [0])[0];

    assert_eq!(t.vm.launder(0, 1, true), 0);
    let snap = t.vm.page_snapshot(page).unwrap();
    assert_eq!(snap.queue, PageQueueKind::Active);
    assert!(snap.flags.contains(PageFlags::DIRTY));
    assert_eq!(t.vm.stats().write_errors, 1);
    assert_eq!(t.vm.stats().stasis, 0);
    t.assert_consistent();
}

#[test]
fn out_of_bounds_is_cleaned_and_demoted() {
    let t = common::build(1, 16, 16);
    let store = Arc::new(MemStore::new());
    store.script(1, PagerStatus::OutOfBounds);
    let object = t.swap_object(&store, 4);
    let pages = t.dirty_in_laundry(object, 0..2);

    assert_eq!(t.vm.launder(0, 2, true), 1);
    assert_eq!(store.call_count(), 1);
    let snap = t.vm.page_snapshot(pages[1]).unwrap();
    assert_eq!(snap.queue, PageQueueKind::Inactive);
    assert!(!snap.flags.contains(PageFlags::DIRTY));
    t.assert_consistent();
}

#[test]
fn partial_accept_leaves_the_rest_dirty() {
    let t = common::build(1, 16, 16);
    let store = Arc::new(MemStore::new());
    store.script(2, PagerStatus::Again);
    let object = t.swap_object(&store, 4);
    let pages = t.dirty_in_laundry(object, 0..4);

    assert_eq!(t.vm.launder(0, 4, true), 3);
    let snap = t.vm.page_snapshot(pages[2]).unwrap();
    assert_eq!(snap.queue, PageQueueKind::Laundry);
    assert!(snap.flags.contains(PageFlags::DIRTY));
    assert_eq!(snap.busy, 0);
    assert_eq!(t.vm.stats().write_errors, 0);
    t.assert_consistent();
}

#[test]
fn referenced_laundry_page_goes_back_to_active() {
    let t = common::build(1, 16, 16);
    let store = Arc::new(MemStore::new());
    let object = t.swap_object(&store, 4);
    let page = t.dirty_in_laundry(object, [0])[0];
    t.env.pmap.touch(page);

    // Fora de shortfall, reativar conta como progresso.
    assert_eq!(t.vm.launder(0, 1, false), 1);
    assert_eq!(store.call_count(), 0);
    assert_eq!(t.vm.page_snapshot(page).unwrap().queue, PageQueueKind::Active);
    assert_eq!(t.vm.stats().reactivated, 1);
}

#[test]
fn swap_pageouts_can_be_disabled() {
    let t = common::build(1, 16, 16);
    t.vm.set_tunable("vm.disable_swapspace_pageouts", "1").unwrap();
    let store = Arc::new(MemStore::new());
    let object = t.swap_object(&store, 4);
    let page = t.dirty_in_laundry(object, [0])[0];

    assert_eq!(t.vm.launder(0, 1, true), 0);
    assert_eq!(store.call_count(), 0);
    assert_eq!(t.vm.page_snapshot(page).unwrap().queue, PageQueueKind::Laundry);
}

#[test]
fn shortfall_is_spread_over_scan_interval() {
    let t = common::build(1, 16, 16);
    t.vm.set_tunable("vm.pageout_page_count", "1").unwrap();
    let store = Arc::new(MemStore::new());
    let object = t.swap_object(&store, 10);
    t.dirty_in_laundry(object, 0..10);

    // Scan sem nada na inativa: a falta inteira vira pedido de shortfall.
    assert!(!t.vm.scan(0, 1));
    let mut worker = LaundryWorker::new(0);
    worker.take_request(&t.vm);

    let cycles = Tunables::default().shortfall_cycles();
    assert_eq!(cycles, 5);
    let mut done = Vec::new();
    for _ in 0..cycles {
        done.push(worker.run_once(&t.vm));
        assert!(worker.in_shortfall());
    }
    assert_eq!(done, vec![2, 2, 2, 2, 2]);
    assert_eq!(worker.target(), 0);
    assert_eq!(t.vm.queue_count(PageQueueKind::Laundry), 0);
    t.assert_consistent();
}

#[test]
fn shortfall_target_includes_missing_inactive_pages() {
    let targets = PagingTargets {
        free_target: 17,
        inactive_target: 10,
        ..PagingTargets::default()
    };
    let t = common::build_targets(1, 16, targets, Tunables::default());
    t.vm.swap_attach();

    // Uma página livre a menos e a inativa vazia contra um alvo de 10.
    assert!(!t.vm.scan(0, 1));
    let mut worker = LaundryWorker::new(0);
    worker.take_request(&t.vm);

    // Nada na laundry: o alvo fica inteiro para os próximos ciclos.
    assert_eq!(worker.run_once(&t.vm), 0);
    assert!(worker.in_shortfall());
    assert_eq!(worker.target(), 11);
}

#[test]
fn background_laundering_follows_scan_wakeups() {
    let targets = PagingTargets {
        free_target: 16,
        background_launder_target: 4,
        ..PagingTargets::default()
    };
    let t = common::build_targets(1, 16, targets, Tunables::default());
    t.vm.set_tunable("vm.pageout_page_count", "1").unwrap();
    let store = Arc::new(MemStore::new());
    let object = t.swap_object(&store, 8);
    t.dirty_in_laundry(object, 0..8);

    let mut worker = LaundryWorker::new(0);
    // Nenhum wakeup ainda: só o piso de lavagem ociosa.
    assert_eq!(worker.run_once(&t.vm), 1);

    // A passada libera a página lavada: 7 sujas contra 9 limpas, um wakeup
    // não basta.
    t.vm.scan(0, 1);
    assert_eq!(worker.run_once(&t.vm), 1);
    assert_eq!(worker.target(), 0);

    // Quatro wakeups desde a última lavagem: 6 * isqrt(4) >= 10 limpas.
    t.vm.scan(0, 1);
    t.vm.scan(0, 1);
    t.vm.scan(0, 1);
    assert_eq!(worker.run_once(&t.vm), 4);
    assert!(!worker.in_shortfall());
    assert_eq!(worker.target(), 0);
    assert_eq!(store.call_count(), 6);
}
