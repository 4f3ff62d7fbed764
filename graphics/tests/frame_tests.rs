//! End-to-end frame loop tests over the dummy backend.

mod common;

use common::TestContext;

use glint_graphics::backend::dummy::DummyCommand;
use glint_graphics::backend::RenderState;
use glint_graphics::flags::MAX_PASSES;
use glint_graphics::{GpuBackend, MeshFlags, StateFlags, TextureFlags};

use rstest::{fixture, rstest};

#[fixture]
fn ctx() -> TestContext {
    TestContext::new()
}

#[rstest]
fn test_static_triangle_end_to_end(mut ctx: TestContext) {
    ctx.record_triangle(0, MeshFlags::MESH_STATIC | MeshFlags::PRIMITIVE_TRIANGLES);
    ctx.local.submit_mesh(&ctx.global, 0);

    let commands = ctx.commands();
    assert!(commands.iter().any(|c| matches!(
        c,
        DummyCommand::CreateVertexBuffer {
            len: 36,
            stride: 12,
            ..
        }
    )));
    assert!(commands
        .iter()
        .any(|c| matches!(c, DummyCommand::CreateIndexBuffer { count: 3, .. })));
    assert!(commands
        .iter()
        .any(|c| matches!(c, DummyCommand::Submit { view: 0, .. })));
}

#[rstest]
fn test_transient_quad_expands_to_six_vertices(mut ctx: TestContext) {
    let flags = MeshFlags::MESH_TRANSIENT | MeshFlags::PRIMITIVE_QUADS;
    ctx.local.begin_mesh(&ctx.global, 1, flags);
    ctx.local.vertex(0.0, 0.0, 0.0);
    ctx.local.vertex(1.0, 0.0, 0.0);
    ctx.local.vertex(1.0, 1.0, 0.0);
    ctx.local.vertex(0.0, 1.0, 0.0);
    ctx.local.end_mesh(&mut ctx.global).unwrap();

    let commands = ctx.commands();
    assert!(commands.iter().any(|c| matches!(
        c,
        DummyCommand::AllocTransient {
            requested: 6,
            allocated: 6,
            stride: 12,
            ..
        }
    )));
    assert!(commands
        .iter()
        .any(|c| matches!(c, DummyCommand::WriteTransient { len: 72, .. })));
}

#[rstest]
fn test_static_mesh_survives_frames_transient_does_not(mut ctx: TestContext) {
    ctx.record_triangle(0, MeshFlags::MESH_STATIC | MeshFlags::PRIMITIVE_TRIANGLES);
    ctx.record_triangle(1, MeshFlags::MESH_TRANSIENT | MeshFlags::PRIMITIVE_TRIANGLES);

    ctx.next_frame();

    // The static mesh is still submittable next frame.
    ctx.local.submit_mesh(&ctx.global, 0);
    assert_eq!(ctx.submit_count(), 1);
}

#[rstest]
#[should_panic(expected = "submitting an invalid mesh")]
fn test_transient_mesh_expires_at_frame_boundary(mut ctx: TestContext) {
    ctx.record_triangle(1, MeshFlags::MESH_TRANSIENT | MeshFlags::PRIMITIVE_TRIANGLES);
    ctx.next_frame();
    ctx.local.submit_mesh(&ctx.global, 1);
}

#[rstest]
fn test_first_frame_flushes_every_pass_then_goes_quiet(mut ctx: TestContext) {
    ctx.next_frame();

    let commands = ctx.commands();
    let clears = commands
        .iter()
        .filter(|c| matches!(c, DummyCommand::SetViewClear { .. }))
        .count();
    let rects = commands
        .iter()
        .filter(|c| matches!(c, DummyCommand::SetViewRectRatio { .. }))
        .count();
    assert_eq!(clears, MAX_PASSES);
    assert_eq!(rects, MAX_PASSES);

    ctx.backend.clear_commands();
    ctx.next_frame();
    assert_eq!(ctx.commands(), vec![DummyCommand::Frame { index: 1 }]);
}

#[rstest]
fn test_unconfigured_passes_clear_nothing(mut ctx: TestContext) {
    ctx.next_frame();

    // Every pass flushes its clear state once, and until configured that
    // state clears nothing.
    let clears: Vec<_> = ctx
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            DummyCommand::SetViewClear { clear, .. } => Some(clear),
            _ => None,
        })
        .collect();
    assert_eq!(clears.len(), MAX_PASSES);
    assert!(clears.iter().all(|clear| clear.flags.is_empty()));
}

#[rstest]
fn test_resize_reapplies_pass_viewports(mut ctx: TestContext) {
    ctx.next_frame();
    ctx.backend.clear_commands();

    ctx.backend.resize_backbuffer(1920, 1080);
    ctx.next_frame();

    let rects = ctx
        .commands()
        .iter()
        .filter(|c| matches!(c, DummyCommand::SetViewRectRatio { .. }))
        .count();
    assert_eq!(rects, MAX_PASSES);
}

#[rstest]
fn test_pass_configuration_reaches_selected_view(mut ctx: TestContext) {
    ctx.local.select_pass(5);
    ctx.local.set_pass_clear_color(&mut ctx.global, 0x334455ff);
    ctx.local.touch_pass(&mut ctx.global);
    ctx.next_frame();

    let commands = ctx.commands();
    assert!(commands
        .iter()
        .any(|c| matches!(c, DummyCommand::Touch { view: 5 })));
    assert!(commands.iter().any(|c| match c {
        DummyCommand::SetViewClear { view: 5, clear } => clear.rgba == 0x334455ff,
        _ => false,
    }));
}

#[rstest]
fn test_draw_state_applies_once_then_resets(mut ctx: TestContext) {
    ctx.record_triangle(0, MeshFlags::MESH_STATIC | MeshFlags::PRIMITIVE_TRIANGLES);

    ctx.local
        .set_state(StateFlags::WRITE_RGB | StateFlags::BLEND_ALPHA);
    ctx.local.submit_mesh(&ctx.global, 0);
    ctx.local.submit_mesh(&ctx.global, 0);

    let states: Vec<RenderState> = ctx
        .commands()
        .iter()
        .filter_map(|c| match c {
            DummyCommand::SetState { state } => Some(*state),
            _ => None,
        })
        .collect();
    assert_eq!(states.len(), 2);
    assert_eq!(states[0], RenderState::WRITE_RGB | RenderState::BLEND_ALPHA);
    // The second submission is back on the default state.
    assert!(states[1].contains(RenderState::CULL_CW | RenderState::DEPTH_TEST_LESS));
}

#[rstest]
fn test_scissor_and_range_apply_to_submission(mut ctx: TestContext) {
    ctx.record_triangle(0, MeshFlags::MESH_STATIC | MeshFlags::PRIMITIVE_TRIANGLES);

    ctx.local.set_scissor(10, 10, 100, 100);
    ctx.local.set_range(0, 3);
    ctx.local.submit_mesh(&ctx.global, 0);

    let commands = ctx.commands();
    assert!(commands.iter().any(|c| matches!(
        c,
        DummyCommand::SetScissor {
            x: 10,
            y: 10,
            width: 100,
            height: 100,
        }
    )));
    assert!(commands
        .iter()
        .any(|c| matches!(c, DummyCommand::SetIndexBuffer { start: 0, count: 3, .. })));
}

#[rstest]
fn test_texture_read_back_round_trip(mut ctx: TestContext) {
    ctx.global
        .create_texture(
            0,
            64,
            64,
            0,
            None,
            TextureFlags::TARGET | TextureFlags::READ_BACK,
        )
        .unwrap();

    let ticket = ctx.global.read_texture(0).unwrap();
    assert!(!ctx.global.is_texture_readable(0));

    let mut dest = vec![0xffu8; 64 * 64 * 4];
    while ctx.global.backend().current_frame() < ticket.frame {
        ctx.next_frame();
    }
    assert!(ctx.global.is_texture_readable(0));
    assert!(ctx.global.retrieve_texture(0, &mut dest));
    assert!(dest.iter().all(|&b| b == 0));
}

#[rstest]
fn test_bound_texture_reaches_stage_zero(mut ctx: TestContext) {
    ctx.global
        .create_texture(3, 16, 16, 0, None, TextureFlags::NEAREST)
        .unwrap();
    ctx.record_triangle(
        0,
        MeshFlags::MESH_STATIC | MeshFlags::PRIMITIVE_TRIANGLES | MeshFlags::VERTEX_TEXCOORD,
    );

    ctx.local.set_texture(&ctx.global, 3);
    ctx.local.submit_mesh(&ctx.global, 0);

    assert!(ctx
        .commands()
        .iter()
        .any(|c| matches!(c, DummyCommand::SetTexture { stage: 0, .. })));
}

#[rstest]
fn test_transient_budget_exhaustion_drops_mesh(mut ctx: TestContext) {
    ctx.backend.set_transient_budget(24);
    ctx.record_triangle(1, MeshFlags::MESH_TRANSIENT | MeshFlags::PRIMITIVE_TRIANGLES);

    // The under-allocated recording is dropped before any upload.
    assert!(!ctx
        .commands()
        .iter()
        .any(|c| matches!(c, DummyCommand::WriteTransient { .. })));
}
