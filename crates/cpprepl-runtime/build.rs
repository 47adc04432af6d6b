fn main() {
    // Generated stubs resolve `repl_resolve_symbol` against the hosting
    // binary at dlopen time, so test binaries need their dynamic symbol
    // table exported.
    if std::env::var_os("CARGO_CFG_UNIX").is_some() {
        println!("cargo:rustc-link-arg-tests=-rdynamic");
    }
}
