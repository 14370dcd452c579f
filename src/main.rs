use spark_cli::exec;
use spark_common::error;

fn main() {
    match exec() {
        Ok(_) => (),
        Err(e) => {
            error!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
