use cache_handle::global;

#[test]
fn try_instance_is_empty_before_init() {
    assert!(global::try_instance().is_none());
}

#[test]
#[should_panic(expected = "before global::init")]
fn instance_before_init_panics() {
    let _ = global::instance();
}
