use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{alpha1, alphanumeric1, char, multispace0, one_of, space0, space1},
    combinator::{map, opt, recognize, value},
    multi::{many0, many1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::{error::LoadError, PortType};

/// A parameter of a subtree definition.
#[derive(Debug, PartialEq, Eq)]
pub struct PortDef<'src> {
    pub direction: PortType,
    pub name: &'src str,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TreeDef<'src> {
    pub(crate) ty: &'src str,
    /// Instance name, given as a string after the type
    pub(crate) name: Option<String>,
    pub(crate) port_maps: Vec<PortMap<'src>>,
    pub(crate) children: Vec<TreeDef<'src>>,
    pub(crate) vars: Vec<VarDef<'src>>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct VarDef<'src> {
    pub(crate) name: &'src str,
    pub(crate) init: Option<&'src str>,
}

impl<'src> TreeDef<'src> {
    pub(crate) fn new(ty: &'src str) -> Self {
        Self {
            ty,
            name: None,
            port_maps: vec![],
            children: vec![],
            vars: vec![],
        }
    }

    pub(crate) fn with_children(mut self, children: Vec<TreeDef<'src>>) -> Self {
        self.children = children;
        self
    }

    pub(crate) fn with_ports(mut self, port_maps: Vec<PortMap<'src>>) -> Self {
        self.port_maps = port_maps;
        self
    }

    /// Splits the body of a block into child nodes and variables. A variable with an
    /// initializer becomes a `SetBool` node at its place.
    fn from_elems(
        ty: &'src str,
        name: Option<String>,
        port_maps: Vec<PortMap<'src>>,
        elems: Vec<TreeElem<'src>>,
    ) -> Self {
        let mut children = vec![];
        let mut vars = vec![];
        for elem in elems {
            match elem {
                TreeElem::Node(node) => children.push(node),
                TreeElem::Var(var) => {
                    if let Some(init) = var.init {
                        children.push(TreeDef::new("SetBool").with_ports(vec![
                            PortMap {
                                ty: PortType::Input,
                                node_port: "value",
                                value: ValueDef::Literal(init.to_owned()),
                            },
                            PortMap {
                                ty: PortType::Output,
                                node_port: "output",
                                value: ValueDef::Ref(var.name),
                            },
                        ]));
                    }
                    vars.push(var);
                }
            }
        }
        Self {
            ty,
            name,
            port_maps,
            children,
            vars,
        }
    }
}

/// Right hand side of a port mapping.
#[derive(Debug, PartialEq, Eq)]
pub enum ValueDef<'src> {
    /// A quoted string with its escapes decoded. A string of the form `"{key}"` still refers to
    /// the blackboard.
    Literal(String),
    Ref(&'src str),
}

#[derive(Debug, PartialEq, Eq)]
pub struct PortMap<'src> {
    pub(crate) ty: PortType,
    pub(crate) node_port: &'src str,
    pub(crate) value: ValueDef<'src>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TreeRootDef<'src> {
    pub(crate) name: &'src str,
    pub(crate) root: TreeDef<'src>,
    pub(crate) ports: Vec<PortDef<'src>>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TreeSource<'src> {
    pub tree_defs: Vec<TreeRootDef<'src>>,
}

impl<'src> TreeSource<'src> {
    /// Parses a whole source text. Unparsed trailing input and duplicate tree names are errors.
    pub fn parse(text: &'src str) -> Result<Self, LoadError> {
        let (rest, source) = parse_file(text).map_err(|e| LoadError::Parse(e.to_string()))?;
        if !rest.is_empty() {
            let line = text[..text.len() - rest.len()].matches('\n').count() + 1;
            let snippet = rest.lines().next().unwrap_or_default();
            return Err(LoadError::Parse(format!(
                "unexpected input at line {line}: {snippet:?}"
            )));
        }
        for (i, tree) in source.tree_defs.iter().enumerate() {
            if source.tree_defs[..i].iter().any(|t| t.name == tree.name) {
                return Err(LoadError::Parse(format!(
                    "tree {:?} is defined twice",
                    tree.name
                )));
            }
        }
        Ok(source)
    }

    pub fn tree(&self, name: &str) -> Option<&TreeRootDef<'src>> {
        self.tree_defs.iter().find(|tree| tree.name == name)
    }

    pub fn tree_names(&self) -> impl Iterator<Item = &'src str> + '_ {
        self.tree_defs.iter().map(|tree| tree.name)
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn newlines(i: &str) -> IResult<&str, ()> {
    value((), delimited(space0, many1(one_of("\r\n")), space0))(i)
}

fn open_paren(i: &str) -> IResult<&str, ()> {
    value((), delimited(space0, char('('), multispace0))(i)
}

fn close_paren(i: &str) -> IResult<&str, ()> {
    value((), delimited(multispace0, char(')'), space0))(i)
}

fn open_brace(i: &str) -> IResult<&str, ()> {
    value((), delimited(space0, char('{'), space0))(i)
}

fn close_brace(i: &str) -> IResult<&str, ()> {
    value((), delimited(multispace0, char('}'), space0))(i)
}

fn line_comment(i: &str) -> IResult<&str, ()> {
    value((), tuple((space0, char('#'), opt(is_not("\n\r")))))(i)
}

fn port_def(i: &str) -> IResult<&str, PortDef<'_>> {
    let (i, direction) = delimited(
        multispace0,
        alt((
            value(PortType::InOut, tag("inout")),
            value(PortType::Input, tag("in")),
            value(PortType::Output, tag("out")),
        )),
        space1,
    )(i)?;
    let (i, name) = terminated(identifier, multispace0)(i)?;
    Ok((i, PortDef { direction, name }))
}

fn subtree_params(i: &str) -> IResult<&str, Vec<PortDef<'_>>> {
    delimited(
        open_paren,
        many0(terminated(port_def, opt(char(',')))),
        close_paren,
    )(i)
}

fn tree_def(i: &str) -> IResult<&str, TreeRootDef<'_>> {
    let (i, _) = delimited(multispace0, tag("tree"), space1)(i)?;
    let (i, name) = terminated(identifier, space0)(i)?;
    let (i, ports) = opt(subtree_params)(i)?;
    let (i, _) = delimited(space0, char('='), space0)(i)?;
    let (i, root) = tree_node(i)?;

    Ok((
        i,
        TreeRootDef {
            name,
            root,
            ports: ports.unwrap_or_default(),
        },
    ))
}

#[derive(Debug)]
enum TreeElem<'src> {
    Node(TreeDef<'src>),
    Var(VarDef<'src>),
}

fn tree_children(i: &str) -> IResult<&str, Vec<TreeElem<'_>>> {
    let (i, _) = many0(newlines)(i)?;

    let (i, elems) = many0(terminated(
        preceded(
            space0,
            alt((
                map(line_comment, |_| None),
                map(var_decl, Some),
                map(condition_node, |node| Some(TreeElem::Node(node))),
                map(tree_node, |node| Some(TreeElem::Node(node))),
            )),
        ),
        many0(newlines),
    ))(i)?;

    Ok((i, elems.into_iter().flatten().collect()))
}

fn tree_node(i: &str) -> IResult<&str, TreeDef<'_>> {
    let (i, ty) = delimited(space0, identifier, space0)(i)?;

    let (i, name) = opt(terminated(quoted, space0))(i)?;

    let (i, port_maps) = opt(delimited(open_paren, port_maps, close_paren))(i)?;

    let (i, elems) = opt(delimited(open_brace, tree_children, close_brace))(i)?;

    let (i, _) = opt(line_comment)(i)?;

    Ok((
        i,
        TreeDef::from_elems(
            ty,
            name,
            port_maps.unwrap_or_default(),
            elems.unwrap_or_default(),
        ),
    ))
}

fn conditional_expr(i: &str) -> IResult<&str, TreeDef<'_>> {
    let (i, negated) = opt(delimited(space0, char('!'), space0))(i)?;

    if negated.is_some() {
        let (i, inner) = conditional_expr(i)?;
        Ok((i, TreeDef::new("Inverter").with_children(vec![inner])))
    } else {
        tree_node(i)
    }
}

/// `if (cond) { ... } else { ... }` becomes an `if` node over the condition and one `Sequence`
/// per branch.
fn condition_node(i: &str) -> IResult<&str, TreeDef<'_>> {
    let (i, _) = terminated(tag("if"), space0)(i)?;

    let (i, condition) = delimited(open_paren, conditional_expr, close_paren)(i)?;

    let (i, then_elems) = delimited(open_brace, tree_children, close_brace)(i)?;

    let (i, else_elems) = opt(preceded(
        delimited(multispace0, tag("else"), space0),
        delimited(open_brace, tree_children, close_brace),
    ))(i)?;

    let mut children = vec![
        condition,
        TreeDef::from_elems("Sequence", None, vec![], then_elems),
    ];
    if let Some(else_elems) = else_elems {
        children.push(TreeDef::from_elems("Sequence", None, vec![], else_elems));
    }

    Ok((i, TreeDef::new("if").with_children(children)))
}

fn var_decl(i: &str) -> IResult<&str, TreeElem<'_>> {
    let (i, _) = terminated(tag("var"), space1)(i)?;

    let (i, name) = terminated(identifier, space0)(i)?;

    let (i, init) = opt(preceded(
        terminated(char('='), space0),
        terminated(alt((tag("true"), tag("false"))), space0),
    ))(i)?;

    let (i, _) = opt(line_comment)(i)?;

    Ok((i, TreeElem::Var(VarDef { name, init })))
}

fn port_maps(i: &str) -> IResult<&str, Vec<PortMap<'_>>> {
    many0(delimited(
        multispace0,
        port_map,
        opt(pair(multispace0, char(','))),
    ))(i)
}

fn port_map(i: &str) -> IResult<&str, PortMap<'_>> {
    let (i, node_port) = delimited(space0, identifier, space0)(i)?;

    let (i, ty) = alt((
        value(PortType::InOut, tag("<->")),
        value(PortType::Input, tag("<-")),
        value(PortType::Output, tag("->")),
    ))(i)?;

    let (i, bound) = delimited(
        space0,
        alt((
            map(quoted, ValueDef::Literal),
            map(identifier, ValueDef::Ref),
        )),
        space0,
    )(i)?;

    Ok((
        i,
        PortMap {
            ty,
            node_port,
            value: bound,
        },
    ))
}

fn quoted(i: &str) -> IResult<&str, String> {
    let (i, text) = delimited(char('"'), opt(is_not("\"")), char('"'))(i)?;
    Ok((i, unescape(text.unwrap_or_default())))
}

fn unescape(text: &str) -> String {
    let mut ret = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            ret.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => ret.push('\n'),
            Some('t') => ret.push('\t'),
            Some(other) => ret.push(other),
            None => ret.push('\\'),
        }
    }
    ret
}

/// Parses tree definitions and comments, stopping at the first thing that is neither.
/// [`TreeSource::parse`] also rejects what is left over.
pub fn parse_file(i: &str) -> IResult<&str, TreeSource<'_>> {
    let (i, stmts) = many0(alt((
        map(preceded(multispace0, line_comment), |_| None),
        map(tree_def, Some),
    )))(i)?;

    // Eat up trailing newlines to indicate that the input was thoroughly consumed
    let (i, _) = multispace0(i)?;

    Ok((
        i,
        TreeSource {
            tree_defs: stmts.into_iter().flatten().collect(),
        },
    ))
}
