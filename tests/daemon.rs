//! Workers reais: start, pressão de memória e shutdown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pageout::hosted::{HostedEnv, MemStore};
use pageout::mm::config::{PagingTargets, Tunables};
use pageout::mm::error::ReclaimError;
use pageout::mm::reclaim::DaemonState;
use pageout::mm::{Pager, Vm, VmConfig};

#[test]
fn daemon_refills_pool_under_pressure() {
    let _ = env_logger::builder().is_test(true).try_init();
    let env = HostedEnv::new();
    let vm = Vm::new(
        VmConfig {
            domains: 1,
            pages_per_domain: 256,
            tunables: Tunables::default(),
            targets: None,
        },
        env.collaborators(),
    );
    let targets = PagingTargets::from_page_count(256, &Tunables::default());
    vm.start();
    vm.start();

    let store = Arc::new(MemStore::new());
    let object = vm.object_create(Pager::Swap(store), 1024);
    for pindex in 0..1024 {
        match vm.page_alloc(object, pindex) {
            Ok(page) => {
                let _ = vm.page_deactivate(page);
            }
            Err(ReclaimError::OutOfMemory) => break,
            Err(err) => panic!("alocação falhou: {}", err),
        }
    }

    assert!(vm.vm_wait_timeout(Duration::from_secs(10)));
    assert!(vm.free_count() >= targets.free_min);
    assert!(vm.stats().wakeups >= 1);
    assert!(vm.stats().freed >= 1);

    vm.shutdown();
    assert!(vm.is_shutting_down());
    assert_eq!(vm.domain(0).unwrap().daemon_state(), DaemonState::Sleeping);
    let problems = vm.audit();
    assert!(problems.is_empty(), "{:?}", problems);
}

#[test]
fn shutdown_without_start_returns() {
    let t = common::build(2, 8, 0);
    t.vm.shutdown();
    assert!(t.vm.is_shutting_down());
    // Quem espera memória não fica preso depois do shutdown.
    t.vm.vm_wait();
}
