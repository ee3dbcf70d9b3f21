//! Montagem comum dos testes de integração.

#![allow(dead_code)]

use std::sync::Arc;

use pageout::hosted::{HostedEnv, MemStore};
use pageout::mm::config::{PagingTargets, Tunables};
use pageout::mm::page::PageId;
use pageout::mm::{ObjectId, Pager, Vm, VmConfig};

/// Um `Vm` pequeno com colaboradores em memória.
pub struct TestVm {
    pub vm: Arc<Vm>,
    pub env: HostedEnv,
}

/// Alvos explícitos: só `free_target` importa, nada acorda o daemon
/// sozinho e a fila inativa não tem alvo próprio.
pub fn targets(free_target: usize) -> PagingTargets {
    PagingTargets {
        free_target,
        ..PagingTargets::default()
    }
}

pub fn build(domains: usize, pages_per_domain: usize, free_target: usize) -> TestVm {
    build_with(domains, pages_per_domain, free_target, Tunables::default())
}

pub fn build_with(
    domains: usize,
    pages_per_domain: usize,
    free_target: usize,
    tunables: Tunables,
) -> TestVm {
    build_targets(domains, pages_per_domain, targets(free_target), tunables)
}

pub fn build_targets(
    domains: usize,
    pages_per_domain: usize,
    targets: PagingTargets,
    tunables: Tunables,
) -> TestVm {
    let _ = env_logger::builder().is_test(true).try_init();
    let env = HostedEnv::new();
    let config = VmConfig {
        domains,
        pages_per_domain,
        tunables,
        targets: Some(targets),
    };
    let vm = Vm::new(config, env.collaborators());
    TestVm { vm, env }
}

impl TestVm {
    /// Objeto anônimo sobre `store`.
    pub fn swap_object(&self, store: &Arc<MemStore>, size: u64) -> ObjectId {
        self.vm.object_create(Pager::Swap(store.clone()), size)
    }

    /// Aloca `pindexes` em `object`, sujas e já na laundry.
    pub fn dirty_in_laundry(
        &self,
        object: ObjectId,
        pindexes: impl IntoIterator<Item = u64>,
    ) -> Vec<PageId> {
        pindexes
            .into_iter()
            .map(|pindex| {
                let page = self.vm.page_alloc(object, pindex).unwrap();
                self.vm.page_dirty(page).unwrap();
                self.vm.page_launder(page).unwrap();
                page
            })
            .collect()
    }

    pub fn assert_consistent(&self) {
        let problems = self.vm.audit();
        assert!(problems.is_empty(), "invariantes violados: {:?}", problems);
    }
}
