fn main() {
    if let Err(err) = single_table_importer::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
