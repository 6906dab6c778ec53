use crate::support::EXIT_USAGE;
use lifecheck_kernel::uuid_to_short_id;
use uuid::Uuid;

pub fn run(uuid: String) {
    if let Err(e) = Uuid::parse_str(&uuid) {
        eprintln!("error: `{uuid}` is not a UUID: {e}");
        std::process::exit(EXIT_USAGE);
    }
    println!("{}", uuid_to_short_id(&uuid));
}
