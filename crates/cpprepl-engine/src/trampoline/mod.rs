//! Trampoline stub synthesis.
//!
//! For every function symbol harvested from a fragment, a small C translation
//! unit is generated containing, per symbol:
//!
//! 1. a writable global pointer `<sym>_ptr`, initially aimed at a
//!    self-resolving load thunk;
//! 2. a naked public symbol with the function's mangled name whose entire
//!    body is an indirect jump through that pointer;
//! 3. the naked load thunk, which preserves the caller's argument registers,
//!    calls back into the REPL's resolver with the pointer slot and the
//!    symbol name, restores the registers, and jumps through the freshly
//!    written pointer.
//!
//! Call sites compiled into other fragments call the mangled name directly;
//! they never know the first call was intercepted. The generated text is
//! x86-64 System V assembly. The thunk leaves floating-point and vector
//! registers untouched; the resolver must not clobber them.

/// Symbol of the resolver callback exported by the REPL process. The
/// generated thunks reference it by name, so the hosting binary must be
/// linked with its dynamic symbol table exported (`-rdynamic`).
pub const RESOLVER_SYMBOL: &str = "repl_resolve_symbol";

/// Generate the stub translation unit for a set of mangled names.
/// Returns `None` when there is nothing to synthesize.
pub fn synthesize<'a, I>(symbols: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut source = String::new();
    for symbol in symbols {
        source.push_str(&stub_for(symbol));
    }
    if source.is_empty() {
        None
    } else {
        Some(source)
    }
}

/// The stub, pointer, and load thunk for one mangled name.
pub fn stub_for(symbol: &str) -> String {
    format!(
        r#"static void __attribute__((naked)) loadFn_{symbol}(void);
void *{symbol}_ptr = (void *)loadFn_{symbol};

__attribute__((naked)) void {symbol}(void) {{
    __asm__ __volatile__(
        "jmp *%0\n"
        :
        : "r"({symbol}_ptr));
}}

static void __attribute__((naked)) loadFn_{symbol}(void) {{
    __asm__(
        "pushq   %rax                \n"
        "pushq   %rbx                \n"
        "pushq   %rcx                \n"
        "pushq   %rdx                \n"
        "pushq   %rsi                \n"
        "pushq   %rdi                \n"
        "pushq   %rbp                \n"
        "pushq   %r8                 \n"
        "pushq   %r9                 \n"
        "pushq   %r10                \n"
        "pushq   %r11                \n"
        "pushq   %r12                \n"
        "pushq   %r13                \n"
        "pushq   %r14                \n"
        "pushq   %r15                \n"
        "movq    %rsp, %rbp          \n");
    __asm__ __volatile__(
        "movq %0, %%rax"
        :
        : "r"(&{symbol}_ptr));
    __asm__(
        "movq    %rax, %rdi          \n"
        "leaq    .LC{symbol}(%rip), %rsi \n"
        "call    {resolver}          \n"
        "popq    %r15                \n"
        "popq    %r14                \n"
        "popq    %r13                \n"
        "popq    %r12                \n"
        "popq    %r11                \n"
        "popq    %r10                \n"
        "popq    %r9                 \n"
        "popq    %r8                 \n"
        "popq    %rbp                \n"
        "popq    %rdi                \n"
        "popq    %rsi                \n"
        "popq    %rdx                \n"
        "popq    %rcx                \n"
        "popq    %rbx                \n"
        "popq    %rax                \n");
    __asm__ __volatile__(
        "jmp *%0\n"
        :
        : "r"({symbol}_ptr));
    __asm__(".section .rodata          \n"
            ".LC{symbol}:              \n"
            ".string \"{symbol}\"      \n"
            ".section .text            \n");
}}

"#,
        symbol = symbol,
        resolver = RESOLVER_SYMBOL,
    )
}

/// Name of the writable pointer slot generated for a mangled name.
pub fn pointer_symbol(symbol: &str) -> String {
    format!("{symbol}_ptr")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_pointer_and_one_public_symbol_per_stub() {
        let source = stub_for("_Z3addii");
        assert_eq!(source.matches("void *_Z3addii_ptr").count(), 1);
        assert_eq!(
            source
                .matches("__attribute__((naked)) void _Z3addii(void)")
                .count(),
            1
        );
        assert_eq!(source.matches(".string \"_Z3addii\"").count(), 1);
    }

    #[test]
    fn pointer_starts_at_the_load_thunk() {
        let source = stub_for("_Z3foov");
        assert!(source.contains("void *_Z3foov_ptr = (void *)loadFn__Z3foov;"));
    }

    #[test]
    fn thunk_calls_the_resolver() {
        let source = stub_for("_Z3barv");
        assert!(source.contains(&format!("call    {RESOLVER_SYMBOL}")));
        // Register save/restore is balanced.
        assert_eq!(source.matches("pushq").count(), 15);
        assert_eq!(source.matches("popq").count(), 15);
    }

    #[test]
    fn synthesize_joins_and_skips_empty() {
        assert!(synthesize(std::iter::empty::<&str>()).is_none());
        let both = synthesize(["_Z1fv", "_Z1gv"]).unwrap();
        assert!(both.contains("_Z1fv_ptr"));
        assert!(both.contains("_Z1gv_ptr"));
    }

    #[test]
    fn pointer_symbol_naming() {
        assert_eq!(pointer_symbol("_Z3addii"), "_Z3addii_ptr");
    }
}
