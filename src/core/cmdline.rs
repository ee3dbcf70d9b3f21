/// Arquivo: core/cmdline.rs
///
/// Propósito: Parser de linha de comando no estilo do kernel.
/// Usado para aplicar tunables do pageout (ex: "vm.pageout_oom_seq=12 vm.panic_on_oom").
///
/// Detalhes de Implementação:
/// - Parser simples de chave=valor separados por espaços.
/// - Uma chave sem `=` é uma flag e tem valor vazio.
/// - A última ocorrência de uma chave vence.

/// Linha de comando já tokenizada.
#[derive(Debug, Clone, Default)]
pub struct CommandLine {
    params: Vec<(String, String)>,
}

impl CommandLine {
    /// Tokeniza a linha de comando.
    pub fn parse(args: &str) -> Self {
        let params = args
            .split_whitespace()
            .map(|token| match token.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (token.to_string(), String::new()),
            })
            .collect();
        Self { params }
    }

    /// Verifica se uma flag (chave sem valor) ou parâmetro existe.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Obtém o valor de um parâmetro. Flags retornam `Some("")`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Itera sobre os pares na ordem em que apareceram.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_and_flags() {
        let cmd = CommandLine::parse("vm.pageout_oom_seq=3  vm.panic_on_oom debug=1 debug=2");
        assert_eq!(cmd.get("vm.pageout_oom_seq"), Some("3"));
        assert_eq!(cmd.get("vm.panic_on_oom"), Some(""));
        assert_eq!(cmd.get("debug"), Some("2"));
        assert!(!cmd.has("root"));
        assert_eq!(cmd.iter().count(), 4);
    }

    #[test]
    fn empty_line_has_no_params() {
        assert!(CommandLine::parse("   ").is_empty());
    }
}
