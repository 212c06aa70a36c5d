//! Send/Sync guarantees for types shared across threads.

use lumberjack::{
    BackoffOverrides, Emitter, EmitterBuilder, EmitterHandle, FieldSet, FramedRecord, Harvester,
    QueueReceiver, QueueSender, RateLimitedWarner, TunnelBuilder, TunnelProcess,
    emitter::RedisConnector,
};
use rstest::rstest;
use static_assertions::assert_impl_all;

#[rstest]
fn builders_are_send_sync() {
    assert_impl_all!(EmitterBuilder: Send, Sync, Clone);
    assert_impl_all!(BackoffOverrides: Send, Sync, Clone);
    assert_impl_all!(TunnelBuilder: Send, Sync, Clone);
}

#[rstest]
fn pipeline_parts_cross_threads() {
    assert_impl_all!(FieldSet: Send, Sync);
    assert_impl_all!(FramedRecord: Send, Sync);
    assert_impl_all!(QueueSender: Send, Sync, Clone);
    assert_impl_all!(QueueReceiver: Send);
    assert_impl_all!(Harvester: Send);
    assert_impl_all!(Emitter<RedisConnector>: Send);
    assert_impl_all!(EmitterHandle: Send, Sync);
    assert_impl_all!(RateLimitedWarner: Send, Sync);
    assert_impl_all!(TunnelProcess: Send);
}
