//! Read/write scenarios through a binding context, over both in-memory and
//! stream-backed byte sources.

use std::io::Cursor;

use crate::ensure_env_logger_initialized;
use crate::{
    BindingContext, BufferDataProvider, IoDataProvider, Node, Property, Tree, ValueConverter,
    ValueProvider,
};
use pretty_assertions::assert_eq;

fn header_payload() -> Tree {
    let mut tree = Tree::new(Node::named("root"));
    tree.add_child(tree.root(), Node::named("header").with_size(2));
    tree.add_child(tree.root(), Node::named("payload").with_size(4));
    tree
}

#[test]
fn test_fixed_size_write_read_round_trip() {
    ensure_env_logger_initialized();
    let mut context = BindingContext::with_template_and_data(
        header_payload(),
        BufferDataProvider::zeroed(6),
    );

    let payload = context.find("payload").unwrap();
    context.write(payload, &[1, 2, 3, 4]).unwrap();
    assert_eq!(context.read(payload).unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn test_interleaved_access_has_no_position_leakage() {
    ensure_env_logger_initialized();
    let cursor = Cursor::new(vec![0_u8; 6]);
    let mut context =
        BindingContext::with_template_and_data(header_payload(), IoDataProvider::new(cursor));

    let header = context.find("header").unwrap();
    let payload = context.find("payload").unwrap();

    context.write(header, &[0xca, 0xfe]).unwrap();
    context.write(payload, &[1, 2, 3, 4]).unwrap();

    // Reads in the opposite order; each must land at its own address.
    assert_eq!(context.read(payload).unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(context.read(header).unwrap(), vec![0xca, 0xfe]);
    assert_eq!(context.read(payload).unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn test_writes_grow_an_empty_buffer() {
    ensure_env_logger_initialized();
    let mut context = BindingContext::with_template(header_payload());

    let header = context.find("header").unwrap();
    let payload = context.find("payload").unwrap();
    context.write(payload, &[1, 2, 3, 4]).unwrap();
    context.write(header, &[9, 9]).unwrap();

    assert_eq!(context.data().unwrap(), vec![9, 9, 1, 2, 3, 4]);
}

#[test]
fn test_payload_sized_by_a_leb128_header() {
    ensure_env_logger_initialized();
    let mut template = Tree::new(Node::named("root"));
    let mut len = Node::named("len");
    len.size = Property::leb128_size();
    template.add_child(template.root(), len);
    let mut payload = Node::named("payload");
    payload.size = Property {
        provider: ValueProvider::Reference {
            name: "len".to_owned(),
        },
        converter: ValueConverter::Leb128,
    };
    template.add_child(template.root(), payload);

    let mut context = BindingContext::with_template_and_data(
        template,
        BufferDataProvider::new(vec![0x03, 0xaa, 0xbb, 0xcc]),
    );

    let len = context.find("len").unwrap();
    let payload = context.find("payload").unwrap();
    assert_eq!(context.size(len).unwrap(), 1);
    assert_eq!(context.offset(payload).unwrap(), 1);
    assert_eq!(context.read(payload).unwrap(), vec![0xaa, 0xbb, 0xcc]);
}

#[test]
fn test_write_int_then_read_int() {
    ensure_env_logger_initialized();
    let mut context = BindingContext::with_template_and_data(
        header_payload(),
        BufferDataProvider::zeroed(6),
    );

    let header = context.find("header").unwrap();
    context.write_int(header, 0xbeef).unwrap();
    assert_eq!(context.read_int(header).unwrap(), 0xbeef);
    // Little endian by default.
    assert_eq!(context.read(header).unwrap(), vec![0xef, 0xbe]);
}

#[test]
fn test_reference_count_follows_a_rewritten_header() {
    ensure_env_logger_initialized();
    let mut template = Tree::new(Node::named("root"));
    template.add_child(template.root(), Node::named("header").with_size(1));
    let fields = template.add_child(template.root(), Node::named("fields"));
    template.add_child(
        fields,
        Node::named("field").with_size(1).with_count_reference("header"),
    );

    let mut context = BindingContext::with_template_and_data(
        template,
        BufferDataProvider::new(vec![1, 0]),
    );
    {
        let bound = context.template().unwrap();
        let fields = bound.child_by_name(bound.root(), "fields").unwrap();
        assert_eq!(bound.children(fields).len(), 1);
    }

    // Rewriting the header does not rebind on its own; replacing the data
    // does.
    context
        .set_data(BufferDataProvider::new(vec![2, 0, 0]))
        .unwrap();
    let bound = context.template().unwrap();
    let fields = bound.child_by_name(bound.root(), "fields").unwrap();
    assert_eq!(bound.children(fields).len(), 2);
}
