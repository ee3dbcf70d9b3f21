//! # Self Tests do Pageout
//!
//! Rodados pelo `pageoutd` antes de subir os workers (feature `self_test`).
//! Cada teste monta um `Vm` pequeno com colaboradores em memória e chama
//! os scans diretamente, sem threads.
//!
//! - `queue_test.rs` - Lista de fila e protocolo de marcador
//! - `reclaim_test.rs` - Scan, laundry, stasis e OOM

pub mod queue_test;
pub mod reclaim_test;

/// Resultado de teste
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    Passed,
    Failed,
    Skipped,
}

/// Um caso de teste
pub struct TestCase {
    pub name: &'static str,
    pub func: fn() -> TestResult,
}

impl TestCase {
    pub const fn new(name: &'static str, func: fn() -> TestResult) -> Self {
        Self { name, func }
    }
}

/// Executa uma suite. Retorna (passed, failed, skipped).
pub fn run_test_suite(name: &str, tests: &[TestCase]) -> (usize, usize, usize) {
    crate::kinfo!("=== Executando suite: {}", name);

    let mut passed = 0;
    let mut failed = 0;
    let mut skipped = 0;

    for test in tests {
        match (test.func)() {
            TestResult::Passed => {
                crate::kinfo!("[PASS] {}", test.name);
                passed += 1;
            }
            TestResult::Failed => {
                crate::kerror!("[FAIL] {}", test.name);
                failed += 1;
            }
            TestResult::Skipped => {
                crate::kwarn!("[SKIP] {}", test.name);
                skipped += 1;
            }
        }
    }

    crate::kinfo!(
        "Resultados: passed={} failed={} skipped={}",
        passed,
        failed,
        skipped
    );
    (passed, failed, skipped)
}

/// Executa todos os self tests. Retorna `true` se nenhum falhou.
pub fn run_reclaim_tests() -> bool {
    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║     🧪 TESTES DO PAGEOUT               ║");
    crate::kinfo!("╚════════════════════════════════════════╝");

    let (_, queue_failed, _) = run_test_suite("queue", queue_test::QUEUE_TESTS);
    let (_, reclaim_failed, _) = run_test_suite("reclaim", reclaim_test::RECLAIM_TESTS);

    if queue_failed + reclaim_failed == 0 {
        crate::kinfo!("╔════════════════════════════════════════╗");
        crate::kinfo!("║  ✅ TODOS OS TESTES PASSARAM!          ║");
        crate::kinfo!("╚════════════════════════════════════════╝");
        true
    } else {
        crate::kerror!("(TEST) {} testes falharam", queue_failed + reclaim_failed);
        false
    }
}
