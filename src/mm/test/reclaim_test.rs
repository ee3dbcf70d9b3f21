//! Testes do motor de reclaim
//!
//! Cenários curtos sobre um `Vm` de um domínio, sem workers: cada teste
//! chama a passada ou a lavagem diretamente.

use std::sync::Arc;

use super::{TestCase, TestResult};
use crate::hosted::{HostedEnv, MemStore};
use crate::mm::config::{PagingTargets, Tunables};
use crate::mm::page::PageQueueKind;
use crate::mm::pager::{Pager, PagerStatus};
use crate::mm::{Vm, VmConfig};

pub const RECLAIM_TESTS: &[TestCase] = &[
    TestCase::new("reclaim_clean_page_freed", test_clean_page_freed),
    TestCase::new("reclaim_dirty_page_laundered", test_dirty_page_laundered),
    TestCase::new("reclaim_stasis_without_swap", test_stasis_without_swap),
    TestCase::new("reclaim_audit_clean", test_audit_clean),
];

fn small_vm(pages: usize, free_target: usize) -> (Arc<Vm>, HostedEnv) {
    let env = HostedEnv::new();
    let config = VmConfig {
        domains: 1,
        pages_per_domain: pages,
        tunables: Tunables::default(),
        targets: Some(PagingTargets {
            free_target,
            ..PagingTargets::default()
        }),
    };
    (Vm::new(config, env.collaborators()), env)
}

fn test_clean_page_freed() -> TestResult {
    let (vm, _env) = small_vm(8, 8);
    let store = Arc::new(MemStore::new());
    let object = vm.object_create(Pager::Swap(store), 8);
    let Ok(page) = vm.page_alloc(object, 0) else {
        return TestResult::Failed;
    };
    if vm.page_deactivate(page).is_err() {
        return TestResult::Failed;
    }
    if !vm.scan(0, 1) || vm.free_count() != 8 {
        return TestResult::Failed;
    }
    TestResult::Passed
}

fn test_dirty_page_laundered() -> TestResult {
    let (vm, env) = small_vm(8, 8);
    let store = Arc::new(MemStore::new());
    let object = vm.object_create(Pager::Swap(store.clone()), 8);
    let Ok(page) = vm.page_alloc(object, 0) else {
        return TestResult::Failed;
    };
    env.pmap.map(page);
    let _ = vm.page_dirty(page);
    let _ = vm.page_deactivate(page);

    vm.scan(0, 1);
    if vm.queue_pages(0, PageQueueKind::Laundry) != vec![page] {
        return TestResult::Failed;
    }
    if vm.launder(0, 1, true) != 1 || store.call_count() != 1 {
        return TestResult::Failed;
    }
    if !vm.scan(0, 1) {
        return TestResult::Failed;
    }
    TestResult::Passed
}

fn test_stasis_without_swap() -> TestResult {
    let (vm, _env) = small_vm(8, 8);
    let store = Arc::new(MemStore::with_status(PagerStatus::Fail));
    let object = vm.object_create(Pager::Swap(store.clone()), 8);
    let Ok(page) = vm.page_alloc(object, 0) else {
        return TestResult::Failed;
    };
    let _ = vm.page_dirty(page);
    let _ = vm.page_launder(page);

    vm.launder(0, 1, true);
    if vm.queue_pages(0, PageQueueKind::Stasis) != vec![page] {
        return TestResult::Failed;
    }
    // Sem swap, stasis não é varrida.
    vm.launder(0, 1, true);
    if store.call_count() != 1 {
        return TestResult::Failed;
    }
    if vm.swap_attach() != 1 || vm.queue_pages(0, PageQueueKind::Laundry) != vec![page] {
        return TestResult::Failed;
    }
    TestResult::Passed
}

fn test_audit_clean() -> TestResult {
    let (vm, env) = small_vm(16, 12);
    let store = Arc::new(MemStore::new());
    let object = vm.object_create(Pager::Swap(store), 16);
    for pindex in 0..10 {
        match vm.page_alloc(object, pindex) {
            Ok(page) if pindex % 2 == 0 => {
                env.pmap.write(page);
                let _ = vm.page_dirty(page);
            }
            Ok(_) => {}
            Err(_) => return TestResult::Failed,
        }
    }
    for pass in 0..4 {
        vm.scan(0, pass);
        vm.launder(0, 4, true);
    }
    if !vm.audit().is_empty() {
        crate::kerror!("(TEST) {:?}", vm.audit());
        return TestResult::Failed;
    }
    TestResult::Passed
}
