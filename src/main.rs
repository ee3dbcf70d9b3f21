//! pageoutd: simulação hosted do daemon de pageout.
//!
//! Responsabilidade:
//! 1. Ler a linha de comando (`domains=`, `pages=`, `seconds=` e tunables `vm.*`).
//! 2. Rodar os self tests (feature `self_test`).
//! 3. Subir um `Vm` com colaboradores em memória e os workers de cada domínio.
//! 4. Gerar carga (alocação, leitura, escrita) até o tempo acabar.
//! 5. Parar os workers e imprimir as estatísticas.
//!
//! Exemplo:
//!
//! ```text
//! RUST_LOG=pageout=debug pageoutd domains=2 pages=2048 seconds=3 vm.pageout_oom_seq=6
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pageout::core::cmdline::CommandLine;
use pageout::hosted::{HostedEnv, MemStore};
use pageout::mm::config::Tunables;
use pageout::mm::error::ReclaimError;
use pageout::mm::page::PageQueueKind;
use pageout::mm::{ObjectId, Pager, Vm, VmConfig};
use pageout::sched::{MapEntryUsage, MappingKind, ProcessInfo, VmSpaceUsage};

/// Gerador pseudo-aleatório determinístico (xorshift)
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n.max(1)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("pageout=info"))
        .format_timestamp_millis()
        .init();

    let line = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let cmdline = CommandLine::parse(&line);
    let tunables = match Tunables::from_cmdline(&line) {
        Ok(tunables) => tunables,
        Err(err) => {
            pageout::kerror!("(BOOT) Linha de comando inválida: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let number = |key: &str, default: usize| {
        cmdline
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    };

    pageout::kinfo!("Redstone OS pageoutd - Iniciando");

    #[cfg(feature = "self_test")]
    if !pageout::mm::test::run_reclaim_tests() {
        return ExitCode::FAILURE;
    }

    let config = VmConfig {
        domains: number("domains", 2),
        pages_per_domain: number("pages", 1024),
        tunables,
        targets: None,
    };
    let seconds = number("seconds", 2) as u64;

    let env = HostedEnv::new();
    let vm = Vm::new(config, env.collaborators());
    vm.start();

    let store = Arc::new(MemStore::new());
    simulate(&vm, &env, &store, Duration::from_secs(seconds));

    vm.shutdown();
    report(&vm, &env, &store);

    let problems = vm.audit();
    for problem in &problems {
        pageout::kerror!("(AUDIT) {}", problem);
    }
    if problems.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Carga: processos com objetos anônimos que crescem, leem e escrevem.
fn simulate(vm: &Arc<Vm>, env: &HostedEnv, store: &Arc<MemStore>, duration: Duration) {
    let mut rng = Rng(0x9e37_79b9_7f4a_7c15);
    let total = vm.pmm().total() as u64;
    let objects: Vec<(u32, ObjectId)> = (0..4u32)
        .map(|n| {
            let object = vm.object_create(Pager::Swap(store.clone()), total);
            (100 + n, object)
        })
        .collect();

    let deadline = Instant::now() + duration;
    let mut next_pindex = vec![0u64; objects.len()];
    let mut alive = vec![true; objects.len()];
    while Instant::now() < deadline && alive.contains(&true) {
        let which = rng.below(objects.len() as u64) as usize;
        if !alive[which] {
            continue;
        }
        let (_, object) = objects[which];

        match vm.page_alloc(object, next_pindex[which]) {
            Ok(page) => {
                next_pindex[which] = (next_pindex[which] + 1) % total;
                if rng.below(3) == 0 {
                    env.pmap.write(page);
                    let _ = vm.page_dirty(page);
                } else {
                    env.pmap.touch(page);
                }
            }
            Err(ReclaimError::OutOfMemory) => {
                vm.vm_wait_timeout(Duration::from_millis(50));
            }
            Err(err) => pageout::kwarn!("(SIM) {}: {}", object, err),
        }

        // Um pedaço do working set continua quente.
        if let Ok(Some(page)) = vm.object_lookup(object, rng.below(next_pindex[which] + 1)) {
            env.pmap.touch(page);
        }

        let killed = env.procs.killed();
        for (idx, &(pid, object)) in objects.iter().enumerate() {
            if !alive[idx] {
                continue;
            }
            if killed.contains(&pid) {
                // O processo morreu: o address space vai junto.
                alive[idx] = false;
                if let Err(err) = vm.object_deallocate(object) {
                    pageout::kwarn!("(SIM) {}: {}", object, err);
                }
                continue;
            }
            let resident = vm.object_resident(object).unwrap_or(0) as u64;
            let mut proc = ProcessInfo::new(pid, "sim");
            proc.vmspace = VmSpaceUsage {
                swap_resident: 0,
                entries: vec![MapEntryUsage {
                    kind: MappingKind::Anonymous,
                    resident,
                    needs_copy: false,
                    object_refs: 1,
                }],
            };
            env.procs.insert(proc);
        }
    }
}

fn report(vm: &Vm, env: &HostedEnv, store: &MemStore) {
    let stats = vm.stats();
    pageout::kinfo!("╔════════════════════════════════════════╗");
    pageout::kinfo!("║     📊 ESTATÍSTICAS DO PAGEOUT         ║");
    pageout::kinfo!("╚════════════════════════════════════════╝");
    pageout::kinfo!("(STATS) livres: {}/{}", vm.free_count(), vm.pmm().total());
    for kind in PageQueueKind::ALL {
        pageout::kinfo!("(STATS) {:<8} {}", kind.name(), vm.queue_count(kind));
    }
    pageout::kinfo!(
        "(STATS) wakeups={} shortfalls={} scanned={} freed={} ({}%)",
        stats.wakeups,
        stats.shortfalls,
        stats.scanned,
        stats.freed,
        stats.reclaim_percent()
    );
    pageout::kinfo!(
        "(STATS) reactivated={} deactivated={} laundered={} stasis={}",
        stats.reactivated,
        stats.deactivated,
        stats.laundered,
        stats.stasis
    );
    pageout::kinfo!(
        "(STATS) pager: {} chamadas, {} páginas; oom kills={} ({:?})",
        store.call_count(),
        store.pages_written(),
        stats.oom_kills,
        env.procs.killed()
    );
}
