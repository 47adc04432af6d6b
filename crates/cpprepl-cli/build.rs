fn main() {
    // Generated trampoline stubs resolve `repl_resolve_symbol` against this
    // binary at dlopen time; export the dynamic symbol table for them.
    if std::env::var_os("CARGO_CFG_UNIX").is_some() {
        println!("cargo:rustc-link-arg-bins=-rdynamic");
    }
}
