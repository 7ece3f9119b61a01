//! End-to-end scenarios from `spec.md` §8, run across real MPI ranks.
//!
//! These link against the ABI symbols directly (the same symbols the
//! compiler's code generator calls) rather than any Rust-facing API, since
//! `cafrt` only promises the C ABI. `#[ignore]`d by default: they require an
//! MPI runtime on the test machine and must be launched under `mpirun`,
//! e.g.:
//!
//! ```text
//! mpirun -n 4 target/debug/deps/multi_image-<hash> --ignored --test-threads=1
//! ```
//!
//! Every test calls `caf_init`/`caf_finalize` itself since MPI only allows
//! one init/finalize pair per process.

use std::os::raw::{c_char, c_int};

extern "C" {
    fn caf_init(host_owns_transport: c_int) -> c_int;
    fn caf_finalize() -> c_int;
    fn caf_this_image() -> c_int;
    fn caf_num_images() -> c_int;
    fn caf_register(size: usize, kind: c_int, stat: *mut c_int, errmsg: *mut c_char, errmsg_len: c_int) -> u64;
    fn caf_deregister(token: u64, data_only: c_int, stat: *mut c_int, errmsg: *mut c_char, errmsg_len: c_int);
    fn caf_sync_all(stat: *mut c_int, errmsg: *mut c_char, errmsg_len: c_int);
    fn caf_image_status(image: c_int) -> c_int;
}

/// `RegisterKind::ComponentRegisterOnly`/etc. wire values live in
/// `cafrt::wire`; plain data tokens are kind `0` (`RegisterKind::Static`).
const REGISTER_KIND_STATIC: c_int = 0;

unsafe fn must_init() {
    assert_eq!(caf_init(0), 0, "caf_init failed");
}

#[test]
#[ignore = "requires mpirun -n >= 2"]
fn this_image_and_num_images_agree_with_world_size() {
    unsafe {
        must_init();
        let me = caf_this_image();
        let n = caf_num_images();
        assert!(me >= 1 && me <= n, "this_image() must be in [1, num_images()]");
        assert!(n >= 2, "run this test under mpirun -n >= 2");
        assert_eq!(caf_finalize(), 0);
    }
}

#[test]
#[ignore = "requires mpirun -n >= 2"]
fn sync_all_is_a_collective_barrier() {
    unsafe {
        must_init();
        let mut stat: c_int = 0;
        caf_sync_all(&mut stat, std::ptr::null_mut(), 0);
        assert_eq!(stat, 0);
        assert_eq!(caf_finalize(), 0);
    }
}

#[test]
#[ignore = "requires mpirun -n >= 2"]
fn register_then_deregister_round_trips() {
    unsafe {
        must_init();
        let mut stat: c_int = 0;
        let token = caf_register(64, REGISTER_KIND_STATIC, &mut stat, std::ptr::null_mut(), 0);
        assert_eq!(stat, 0);
        assert_ne!(token, 0);

        caf_sync_all(&mut stat, std::ptr::null_mut(), 0);
        assert_eq!(stat, 0);

        caf_deregister(token, 0, &mut stat, std::ptr::null_mut(), 0);
        assert_eq!(stat, 0);
        assert_eq!(caf_finalize(), 0);
    }
}

#[test]
#[ignore = "requires mpirun -n >= 2"]
fn image_status_reports_peers_alive_before_any_stop() {
    unsafe {
        must_init();
        let n = caf_num_images();
        for image in 1..=n {
            assert_eq!(caf_image_status(image), 0, "image {image} should be observed alive");
        }
        assert_eq!(caf_finalize(), 0);
    }
}
