//! Cenários ponta a ponta do pageout (sem workers).

mod common;

use std::sync::Arc;

use pageout::hosted::MemStore;
use pageout::mm::config::Tunables;
use pageout::mm::page::PageQueueKind;
use pageout::mm::pmap::Pmap;
use pageout::mm::reclaim::LaundryRequest;
use pageout::mm::{PageFlags, PagerStatus};
use pageout::sched::{MapEntryUsage, MappingKind, ProcessInfo, VmSpaceUsage};

#[test]
fn clean_inactive_page_without_shortage_stays() {
    let t = common::build(1, 16, 0);
    let store = Arc::new(MemStore::new());
    let object = t.swap_object(&store, 16);
    let page = t.vm.page_alloc(object, 0).unwrap();
    t.vm.page_deactivate(page).unwrap();

    assert!(t.vm.scan(0, 1));

    assert_eq!(t.vm.queue_pages(0, PageQueueKind::Inactive), vec![page]);
    assert_eq!(store.call_count(), 0);
    assert_eq!(t.vm.stats().freed, 0);
    t.assert_consistent();
}

#[test]
fn single_dirty_page_is_laundered_then_freed() {
    let t = common::build(1, 16, 16);
    let store = Arc::new(MemStore::new());
    let object = t.swap_object(&store, 16);
    let page = t.vm.page_alloc(object, 0).unwrap();
    t.env.pmap.map(page);
    t.vm.page_dirty(page).unwrap();
    t.vm.page_deactivate(page).unwrap();

    // Falta de 1: a página suja não pode ser liberada, vai para a laundry.
    assert!(!t.vm.scan(0, 1));
    assert_eq!(t.vm.queue_pages(0, PageQueueKind::Laundry), vec![page]);
    assert_eq!(
        t.vm.domain(0).unwrap().laundry_request(),
        LaundryRequest::Shortfall
    );

    assert_eq!(t.vm.launder(0, 1, true), 1);
    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].run.len(), 1);
    assert_eq!(calls[0].run[0].page, page);

    let snap = t.vm.page_snapshot(page).unwrap();
    assert_eq!(snap.queue, PageQueueKind::Inactive);
    assert!(!snap.flags.contains(PageFlags::DIRTY));
    assert_eq!(t.vm.queue_pages(0, PageQueueKind::Inactive)[0], page);

    assert!(t.vm.scan(0, 1));
    assert_eq!(t.vm.page_snapshot(page).unwrap().queue, PageQueueKind::Free);
    assert_eq!(t.vm.free_count(), 16);
    assert_eq!(t.vm.paging_target(), 0);
    assert!(!t.env.pmap.is_mapped(page));
    t.assert_consistent();
}

#[test]
fn swap_exhaustion_parks_page_in_stasis_until_attach() {
    let t = common::build(1, 16, 16);
    let store = Arc::new(MemStore::with_status(PagerStatus::Fail));
    let object = t.swap_object(&store, 16);
    let page = t.vm.page_alloc(object, 0).unwrap();
    t.vm.page_dirty(page).unwrap();
    t.vm.page_launder(page).unwrap();

    assert_eq!(t.vm.launder(0, 1, true), 1);
    assert_eq!(t.vm.queue_pages(0, PageQueueKind::Stasis), vec![page]);
    assert_eq!(t.vm.stats().stasis, 1);

    // Sem swap, stasis fica de fora da lavagem.
    assert_eq!(t.vm.launder(0, 1, true), 0);
    assert_eq!(store.call_count(), 1);

    assert_eq!(t.vm.swap_attach(), 1);
    assert_eq!(t.vm.queue_pages(0, PageQueueKind::Laundry), vec![page]);
    assert!(t.vm.queue_pages(0, PageQueueKind::Stasis).is_empty());

    store.set_status(PagerStatus::Complete);
    assert_eq!(t.vm.launder(0, 1, true), 1);
    assert_eq!(store.call_count(), 2);
    assert_eq!(t.vm.page_snapshot(page).unwrap().queue, PageQueueKind::Inactive);
    t.assert_consistent();
}

#[test]
fn contiguous_dirty_run_is_one_pager_call() {
    let t = common::build(1, 16, 16);
    let store = Arc::new(MemStore::new());
    let object = t.swap_object(&store, 10);
    for pindex in 0..10 {
        let page = t.vm.page_alloc(object, pindex).unwrap();
        t.vm.page_dirty(page).unwrap();
        t.vm.page_launder(page).unwrap();
    }

    assert_eq!(t.vm.launder(0, 10, true), 10);

    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    let pindexes: Vec<u64> = calls[0].run.iter().map(|io| io.pindex).collect();
    assert_eq!(pindexes, (0..10).collect::<Vec<_>>());
    assert_eq!(t.vm.queue_count(PageQueueKind::Laundry), 0);
    assert_eq!(t.vm.queue_count(PageQueueKind::Inactive), 10);
    t.assert_consistent();
}

fn process(pid: u32, resident: u64) -> ProcessInfo {
    let mut proc = ProcessInfo::new(pid, "hog");
    proc.vmspace = VmSpaceUsage {
        swap_resident: 0,
        entries: vec![MapEntryUsage {
            kind: MappingKind::Anonymous,
            resident,
            needs_copy: false,
            object_refs: 1,
        }],
    };
    proc
}

#[test]
fn stuck_domains_kill_exactly_once_per_quorum() {
    let mut tunables = Tunables::default();
    tunables.pageout_oom_seq = 3;
    // Alvo maior que a memória: nenhuma passada progride.
    let t = common::build_with(2, 4, 100, tunables);
    t.env.procs.insert(process(100, 50));
    t.env.procs.insert(process(200, 10));

    for _ in 0..2 {
        for domain in 0..2 {
            assert!(!t.vm.scan(domain, 1));
        }
    }
    assert_eq!(t.vm.oom_votes(), 0);
    assert!(t.env.procs.killed().is_empty());

    t.vm.scan(0, 1);
    assert_eq!(t.vm.oom_votes(), 1);
    assert!(t.env.procs.killed().is_empty());

    t.vm.scan(1, 1);
    assert_eq!(t.env.procs.killed(), vec![100]);
    assert_eq!(t.env.procs.renices(), vec![(100, -20)]);
    assert_eq!(t.vm.oom_votes(), 0);
    assert_eq!(t.vm.stats().oom_votes, 2);
    assert_eq!(t.vm.stats().oom_kills, 1);

    // Próximo episódio: a contagem recomeçou do zero.
    for _ in 0..3 {
        for domain in 0..2 {
            t.vm.scan(domain, 1);
        }
    }
    assert_eq!(t.env.procs.killed(), vec![100, 200]);
    assert_eq!(t.vm.stats().oom_kills, 2);
}

#[test]
#[should_panic(expected = "panic_on_oom")]
fn panic_on_oom_halts_instead_of_killing() {
    let mut tunables = Tunables::default();
    tunables.pageout_oom_seq = 1;
    tunables.panic_on_oom = true;
    let t = common::build_with(1, 4, 100, tunables);
    t.env.procs.insert(process(100, 50));
    t.vm.scan(0, 1);
}
