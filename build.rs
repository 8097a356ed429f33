fn main() {
    println!("cargo:rerun-if-env-changed=AIRNODE_CONFIG_JSON");

    // ESP-IDF link arguments are only needed for the firmware image;
    // host builds (tests, simulation) skip them.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
