use std::env;
use std::path::{Path, PathBuf};

use syntect::dumps::dump_to_uncompressed_file;
use two_face::syntax;

fn main() {
    let out_dir = match env::var("OUT_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(err) => panic!("OUT_DIR not set: {err}"),
    };

    write_syntax_pack(&out_dir).expect("failed to write syntax pack");

    println!("cargo:rerun-if-changed=build.rs");
}

fn write_syntax_pack(out_dir: &Path) -> Result<(), String> {
    let syntax_set = syntax::extra_newlines();
    let pack_path = out_dir.join("syntaxes.packdump");
    dump_to_uncompressed_file(&syntax_set, &pack_path)
        .map_err(|err| format!("failed to encode syntax set: {err}"))?;

    println!("cargo:rustc-env=SYNTAX_PACK_FILE={}", pack_path.display());

    Ok(())
}
